//! Two nodes over the in-process hub: a host broadcasting a tone, a
//! listener receiving it and printing waveform peaks.
//!
//! ```sh
//! cargo run -p aircast-core --example loopback
//! ```

use aircast_core::capture::SyntheticCapture;
use aircast_core::media::WaveformSampler;
use aircast_core::session::{Command, Role, SessionRunner};
use aircast_core::transport::MemoryHub;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        )
        .init();

    let hub = MemoryHub::new();

    let (host_transport, host_events) = hub.register();
    let (host_runner, mut host) = SessionRunner::new(
        Arc::new(host_transport),
        host_events,
        Arc::new(SyntheticCapture::tone(440.0)),
    );
    tokio::spawn(host_runner.run());

    let (listener_transport, listener_events) = hub.register();
    let (listener_runner, mut listener) = SessionRunner::new(
        Arc::new(listener_transport),
        listener_events,
        Arc::new(SyntheticCapture::silence()),
    );
    tokio::spawn(listener_runner.run());

    let host_id = host.wait_identity().await.context("host identity")?;
    listener.wait_identity().await.context("listener identity")?;
    println!("host identity: {host_id}");

    host.send(Command::SetRole(Role::Broadcaster)).await?;
    host.send(Command::StartBroadcast).await?;
    listener
        .send(Command::Connect {
            remote: host_id.clone(),
        })
        .await?;

    let route = tokio::time::timeout(Duration::from_secs(5), listener.next_playback())
        .await
        .context("waiting for the host's stream")?
        .context("playback channel closed")?;
    println!("receiving stream {} from {}", route.stream.id(), route.remote);

    let mut sampler =
        WaveformSampler::new(&route.stream).context("stream carries no audio track")?;
    for _ in 0..5 {
        match sampler.next_frame() {
            Some(frame) => println!("waveform peak: {}", frame.peak()),
            None => break,
        }
        tokio::time::sleep(Duration::from_millis(16)).await;
    }

    host.send(Command::StopBroadcast).await?;
    host.send(Command::Shutdown).await?;
    listener.send(Command::Shutdown).await?;
    Ok(())
}
