//! Scan source reading one code per line.
//!
//! This is how keyboard-wedge barcode scanners present codes on a terminal.
//! With `repeat > 1` each line is re-emitted at the configured frame interval,
//! the way a camera keeps decoding a code that stays in view.

use checkin_core::{ScanOptions, ScanSink, ScanSource, ScanSourceError};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;

pub struct LineScanSource<R> {
    reader: Option<R>,
    repeat: u32,
    frame_interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl<R> LineScanSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R, repeat: u32, frame_interval: Duration) -> Self {
        Self {
            reader: Some(reader),
            repeat: repeat.max(1),
            frame_interval,
            task: None,
        }
    }
}

impl<R> ScanSource for LineScanSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn start(&mut self, options: &ScanOptions, sink: ScanSink) -> Result<(), ScanSourceError> {
        if self.task.is_some() {
            return Err(ScanSourceError::AlreadyStarted);
        }
        let reader = self
            .reader
            .take()
            .ok_or_else(|| ScanSourceError::Unavailable("input already consumed".to_string()))?;

        tracing::debug!(
            facing = ?options.facing,
            repeat = self.repeat,
            frame_interval_ms = self.frame_interval.as_millis() as u64,
            "Line scan source started"
        );
        self.task = Some(tokio::spawn(pump_lines(
            reader,
            sink,
            self.repeat,
            self.frame_interval,
        )));
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ScanSourceError> {
        if let Some(task) = self.task.take() {
            task.abort();
            // Aborted or finished; either way the sink is gone.
            let _ = task.await;
        }
        Ok(())
    }
}

async fn pump_lines<R>(reader: R, sink: ScanSink, repeat: u32, frame_interval: Duration)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                sink.decode_error(format!("input read failed: {}", err));
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        for frame in 0..repeat {
            if sink.is_closed() {
                return;
            }
            if frame > 0 {
                tokio::time::sleep(frame_interval).await;
            }
            sink.decoded(&line);
        }
    }
    tracing::debug!("Line scan source reached end of input");
}
