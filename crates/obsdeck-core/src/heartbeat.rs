// ── Heartbeat ──
//
// One poll per interval while Connected. A poll is a single round of
// engine stats plus stream and record status, which doubles as the
// health check: failures are counted on the session, and the link is
// declared dropped once the threshold is reached.

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::convert::{self, EngineStats, OutputSample};
use crate::error::CoreError;
use crate::session::{LinkHandle, Session};

struct Poll {
    stream: OutputSample,
    record: OutputSample,
    stats: EngineStats,
}

pub(crate) async fn run(session: Session, handle: LinkHandle, cancel: CancellationToken) {
    let settings = session.settings();
    let threshold = settings.heartbeat_failure_threshold.max(1);
    let mut interval = tokio::time::interval(settings.heartbeat_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    // Previous stream byte counter, for the bitrate estimate.
    let mut last_bytes: Option<(u64, Instant)> = None;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = poll(&handle) => result,
        };

        let failures = match result {
            Ok(poll) => {
                let now = Instant::now();
                let bitrate = match last_bytes {
                    Some((prev, at)) if poll.stream.active => Some(convert::bitrate_bps(
                        prev,
                        poll.stream.bytes,
                        now.duration_since(at),
                    )),
                    _ => None,
                };
                last_bytes = poll.stream.active.then_some((poll.stream.bytes, now));
                if session.is_current(handle.generation) {
                    session.apply_status(poll.stream, poll.record, poll.stats, bitrate);
                }
                session.record_poll(handle.generation, true)
            }
            Err(e) => {
                debug!(error = %e, "heartbeat poll failed");
                session.record_poll(handle.generation, false)
            }
        };

        let Some(failures) = failures else {
            break;
        };
        if failures >= threshold {
            warn!(failures, "heartbeat threshold reached");
            session.handle_drop(
                handle.generation,
                &format!("heartbeat failed {failures} times"),
            );
            break;
        }
    }
    debug!(generation = handle.generation, "heartbeat exiting");
}

async fn poll(handle: &LinkHandle) -> Result<Poll, CoreError> {
    let (stats, stream, record) = tokio::try_join!(
        handle.call("GetStats", None),
        handle.call("GetStreamStatus", None),
        handle.call("GetRecordStatus", None),
    )?;
    Ok(Poll {
        stream: convert::output_status("GetStreamStatus", &stream)?,
        record: convert::output_status("GetRecordStatus", &record)?,
        stats: convert::stats(&stats)?,
    })
}

