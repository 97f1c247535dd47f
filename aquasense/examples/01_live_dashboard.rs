use std::time::Duration;

use aquasense::{Broker, Consumer, Parameter, PhysicalRange};
use aquasense_mock::MockFeed;
use aquasense_mock::fixtures::{faulted_firmware_record, firmware_record};
use futures::StreamExt;
use futures::channel::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Suggested: RUST_LOG=info,aquasense=debug (build with --features tracing)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();

    let (feed, controller) = MockFeed::new_with_controller("demo-store");
    let broker = Broker::builder()
        .feed(feed)
        .window_size(10)
        .replay_on_join(true)
        .reject_sensor_faults(true)
        .physical_range(Parameter::Ph, PhysicalRange::new(0.0, 14.0))
        .physical_range(Parameter::Turbidity, PhysicalRange::new(0.0, 150.0))
        .build()?;

    // the dashboard renders on its own task; callbacks only forward
    let (tx, mut rx) = mpsc::unbounded();
    let dashboard = broker.subscribe(
        Consumer::builder()
            .name("dashboard")
            .on_update(move |w| {
                let _ = tx.unbounded_send(w);
            })
            .on_connectivity(|up| println!("[dashboard] connected: {up}"))
            .on_error(|e| eprintln!("[dashboard] feed error: {e}"))
            .build()?,
    )?;

    let ph_detail = broker.subscribe(Consumer::on_update(|w| {
        let ph = w.latest.get(Parameter::Ph);
        println!(
            "[ph detail] {:.1} at {} ({:?})",
            ph.value, ph.observed_at, ph.status
        );
    }))?;

    let render = tokio::spawn(async move {
        while let Some(w) = rx.next().await {
            println!("[dashboard] {} readings", w.history.len());
            for (param, lv) in w.latest.iter() {
                let marker = if lv.is_defaulted() { " (default)" } else { "" };
                println!("  {param:<13} {:>7.1} {}{marker}", lv.value, param.unit());
            }
        }
    });

    let start = chrono::Utc::now();
    let uploads = [
        firmware_record(10, start, 24.1, 7.2, 3.1, 248.0, 496.0),
        faulted_firmware_record(20, start + chrono::TimeDelta::seconds(10)),
        firmware_record(30, start + chrono::TimeDelta::seconds(20), 24.4, 15.9, 2.9, 251.0, 502.0),
    ];
    tokio::time::sleep(Duration::from_millis(50)).await;
    for rec in uploads {
        controller.insert("/r", rec).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // a late view gets the current window immediately
    let late = broker.subscribe(Consumer::on_update(|w| {
        println!("[late view] replayed {} readings", w.history.len());
    }))?;

    controller
        .push_error(aquasense::AquaError::feed("demo-store", "connection reset"))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("state: {:?}", broker.state());
    println!("telemetry: {:?}", broker.telemetry());

    drop(late);
    drop(ph_detail);
    broker.close();
    // releasing the last handle to the dashboard consumer closes its channel
    drop(dashboard);
    render.await?;
    Ok(())
}
