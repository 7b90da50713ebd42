use std::{path::Path, time::Duration};

use anyhow::Result;
use tokio::{io::BufReader, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    cli::console::{read_commands, render_events},
    config::{JsonConfigStore, CONFIG_FILE_NAME},
    ledger::storage::LedgerStorageImpl,
    tracker::controller::TrackingController,
    utils::clock::{Clock, DefaultClock},
    window_api::{ForegroundProbe, GenericForegroundProbe},
};

use messages::{TrackerCommand, TrackerEvent};
use tracking::TrackingModule;

pub mod messages;
pub mod shutdown;
pub mod tracking;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Represents the starting point for the interactive tracker. Runs until ctrl-c or `quit`.
pub async fn start_tracker(dir: &Path, tick_interval: Duration) -> Result<()> {
    let (command_sender, command_receiver) = mpsc::channel::<TrackerCommand>(16);
    let (event_sender, event_receiver) = mpsc::channel::<TrackerEvent>(16);
    let probe = GenericForegroundProbe::new()?;

    let shutdown_token = CancellationToken::new();

    let tracking = create_tracking_module(
        dir,
        probe,
        command_receiver,
        event_sender,
        &shutdown_token,
        tick_interval,
        DefaultClock,
        DefaultClock,
    );

    let (_, tracking_result, input_result, output_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        tracking.run(),
        read_commands(
            BufReader::new(tokio::io::stdin()),
            command_sender,
            shutdown_token.clone()
        ),
        render_events(event_receiver, std::io::stdout()),
    );

    if let Err(tracking_result) = &tracking_result {
        error!("Tracking module got an error {:?}", tracking_result);
    }

    if let Err(input_result) = input_result {
        error!("Command reader got an error {:?}", input_result);
    }

    if let Err(output_result) = output_result {
        error!("Renderer got an error {:?}", output_result);
    }

    tracking_result
}

#[allow(clippy::too_many_arguments)]
fn create_tracking_module(
    dir: &Path,
    probe: impl ForegroundProbe + 'static,
    commands: mpsc::Receiver<TrackerCommand>,
    events: mpsc::Sender<TrackerEvent>,
    shutdown_token: &CancellationToken,
    tick_interval: Duration,
    controller_clock: impl Clock,
    schedule_clock: impl Clock,
) -> TrackingModule<JsonConfigStore, LedgerStorageImpl> {
    let controller = TrackingController::new(
        JsonConfigStore::new(dir.join(CONFIG_FILE_NAME)),
        LedgerStorageImpl::new(dir),
        Box::new(controller_clock),
    );
    TrackingModule::new(
        controller,
        Box::new(probe),
        commands,
        events,
        shutdown_token.clone(),
        tick_interval,
        Box::new(schedule_clock),
    )
}

#[cfg(test)]
mod runner_tests {
    use std::{fs, time::Duration};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::{sync::mpsc, time::Instant};
    use tokio_util::sync::CancellationToken;

    use crate::{
        config::{ConfigStore, JsonConfigStore, TrackingConfig},
        runner::{
            create_tracking_module,
            messages::{TrackerCommand, TrackerEvent},
        },
        tracker::state::TrackerStatus,
        utils::{clock::Clock, logging::TEST_LOGGING},
        window_api::MockForegroundProbe,
    };

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    #[derive(Clone)]
    struct TestClock {
        start_time: DateTime<Utc>,
        reference: Instant,
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Utc> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }

        async fn sleep_until(&self, instant: tokio::time::Instant) {
            tokio::time::sleep_until(instant).await;
        }

        fn today(&self) -> NaiveDate {
            self.time().date_naive()
        }
    }

    fn test_titles() -> Vec<&'static str> {
        vec!["Untitled-1 - Adobe Photoshop", "Untitled-1 - Adobe Photoshop", "Terminal"]
    }

    /// Drives the whole loop with paused tokio time: ticks, a pause, a save and quit.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_tracker() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        JsonConfigStore::new(dir.path().join("config.json"))
            .save(&TrackingConfig::new("Photoshop", "Retouching"))?;

        let mut probe = MockForegroundProbe::new();
        let mut titles = test_titles().into_iter().cycle();
        probe
            .expect_foreground_title()
            .returning(move || Ok(titles.next().unwrap().to_string()));

        let test_clock = TestClock {
            start_time: Utc.from_utc_datetime(&TEST_START_DATE),
            reference: Instant::now(),
        };

        let shutdown_token = CancellationToken::new();
        let (command_sender, command_receiver) = mpsc::channel(10);
        let (event_sender, mut event_receiver) = mpsc::channel(100);
        let tracking = create_tracking_module(
            dir.path(),
            probe,
            command_receiver,
            event_sender,
            &shutdown_token,
            Duration::from_secs(1),
            test_clock.clone(),
            test_clock,
        );

        let (tracking_result, _) = tokio::join!(tracking.run(), async {
            // Six ticks: two matching, one not, repeated.
            tokio::time::sleep(Duration::from_millis(5500)).await;
            command_sender.send(TrackerCommand::TogglePause).await?;
            command_sender.send(TrackerCommand::Save { title: None }).await?;
            command_sender.send(TrackerCommand::SetTitle("Date".into())).await?;
            command_sender.send(TrackerCommand::Status).await?;
            command_sender.send(TrackerCommand::Quit).await?;
            anyhow::Ok(())
        });
        tracking_result?;

        let mut events = vec![];
        while let Some(event) = event_receiver.recv().await {
            events.push(event);
        }

        assert!(matches!(events.first(), Some(TrackerEvent::Settings(_))));
        let receipt = events
            .iter()
            .find_map(|event| match event {
                TrackerEvent::Saved(receipt) => Some(receipt.clone()),
                _ => None,
            })
            .expect("session should have been saved");
        // Tracked 0-2 and 3-5, the 1s inside each window is counted.
        assert_eq!(receipt.saved.seconds(), 4);
        assert_eq!(receipt.title, "Retouching");
        assert!(events.iter().any(|event| matches!(
            event,
            TrackerEvent::Snapshot(snapshot) if snapshot.status == TrackerStatus::PausedManual
        )));
        assert!(events
            .iter()
            .any(|event| matches!(event, TrackerEvent::SettingsRejected(_))));
        assert!(events.iter().any(|event| matches!(
            event,
            TrackerEvent::SavedToday { title, total } if title == "Retouching" && total.seconds() == 4
        )));
        assert!(matches!(
            events.last(),
            Some(TrackerEvent::Stopped { unsaved }) if unsaved.seconds() == 0
        ));

        let ledger = fs::read_to_string(dir.path().join("timelog.csv"))?;
        assert_eq!(
            ledger.lines().collect::<Vec<_>>(),
            vec!["Date,Retouching", "04.07.2018,0:00:04"]
        );
        Ok(())
    }
}
