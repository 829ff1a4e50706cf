use alarm_feed::alarm::acknowledge;
use alarm_feed::{
    AlarmBoard, AlarmEvent, ConnectionEvent, ConnectionManager, ConnectionOptions, ConnectionState,
    OutboundFrame,
};
use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

/// Follow a live alarm feed, falling back to canned alarms while offline
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("alarm_feed=info")),
        )
        .init();

    let url = std::env::var("ALARM_FEED_URL")
        .unwrap_or_else(|_| "ws://localhost:8080/alarms".to_string());
    println!("📡 Alarm feed: {}\n", url);

    let manager = ConnectionManager::builder(
        &url,
        ConnectionOptions {
            max_attempts: Some(3),
            base_delay: Some(2000),
            connect_timeout: Some(5000),
            ..Default::default()
        },
    )?
    .on_open(|| println!("✅ Stream open"))
    .on_close(|| println!("🔌 Stream closed"))
    .on_error(|error| println!("⚠️  {}", error))
    .build();

    let mut events = manager.subscribe();
    let mut status = manager.watch_status();

    // Queued until the first open
    manager.send(&OutboundFrame::ping())?;
    manager.start();

    let mut board = AlarmBoard::with_canned();
    print_board("canned", &board);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ConnectionEvent::Opened) => {
                    // Live data replaces the canned list
                    board = AlarmBoard::new();
                }
                Ok(ConnectionEvent::Message(frame)) => match AlarmEvent::from_frame(&frame) {
                    Ok(AlarmEvent::Created(alarm)) if !alarm.acknowledged => {
                        println!("🚨 [{:?}] {}: {}", alarm.severity, alarm.site_id, alarm.message);
                        manager.send(&acknowledge(&alarm.id, Utc::now()))?;
                        board.apply(&AlarmEvent::Created(alarm));
                        print_board("live", &board);
                    }
                    Ok(event) => {
                        board.apply(&event);
                        print_board("live", &board);
                    }
                    Err(e) => tracing::warn!("Skipping '{}' frame: {}", frame.event, e),
                },
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Dropped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                if snapshot.has_given_up() {
                    println!("❌ Giving up on the live feed, showing canned alarms");
                    board = AlarmBoard::with_canned();
                    print_board("canned", &board);
                } else if snapshot.state == ConnectionState::Closed && snapshot.retry_attempt > 0 {
                    println!("⏳ Reconnecting (attempt {})", snapshot.retry_attempt);
                }
            }
            _ = &mut shutdown => break,
        }
    }

    println!("\nDisconnecting...");
    manager.stop();
    println!("Disconnected!");

    Ok(())
}

fn print_board(source: &str, board: &AlarmBoard) {
    println!("── {} alarms ({}) ──", board.len(), source);
    for alarm in board.active() {
        let ack = if alarm.acknowledged { "ack" } else { "new" };
        println!(
            "  {:<8} {:<12} {:<4} {}",
            format!("{:?}", alarm.severity),
            alarm.site_id,
            ack,
            alarm.message
        );
    }
}
