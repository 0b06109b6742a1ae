//! 標準エラー出力へのロガー
//!
//! `-v` の回数でログレベルを決める。
//!
//! ```text
//! 2026-10-19T12:00:00.123+09:00 INFO  [camstream_pipeline::driver] id=0x01 order=0x00 complete=0 payload=1400
//! ```

use std::io::{self, Write};

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub(crate) struct SyncLogger {
    level: LevelFilter,
}

impl SyncLogger {
    pub(crate) fn new(verbose_level: u8) -> Self {
        SyncLogger {
            level: level_for(verbose_level),
        }
    }

    pub(crate) fn into_global_logger(self) -> Result<(), SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

/// 0 = info, 1 = debug, 2 以上 = trace
fn level_for(verbose_level: u8) -> LevelFilter {
    match verbose_level {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

impl Log for SyncLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
        // 書き込みに失敗しても受信は止めない
        let _ = writeln!(
            io::stderr().lock(),
            "{now} {:<5} [{}] {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use log::Level;

    use super::*;

    #[test]
    fn test_verbose_levels() {
        assert_eq!(level_for(0), LevelFilter::Info);
        assert_eq!(level_for(1), LevelFilter::Debug);
        assert_eq!(level_for(2), LevelFilter::Trace);
        assert_eq!(level_for(9), LevelFilter::Trace);
    }

    #[test]
    fn test_enabled_respects_level() {
        let logger = SyncLogger::new(0);
        let info = Metadata::builder().level(Level::Info).build();
        let debug = Metadata::builder().level(Level::Debug).build();
        assert!(logger.enabled(&info));
        assert!(!logger.enabled(&debug));
    }
}
