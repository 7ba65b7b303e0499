//! Runtime configuration surface (component L): plain struct + builder,
//! `std::time::Duration` throughout rather than bare integers, following
//! the teacher's `DatabaseConfig` (`src/database/connection_pool.rs`)
//! convention of one struct with a sensible `Default`.

use std::time::Duration;

/// A single `"HH:MM" → collections` schedule entry. An empty
/// `collections` list means "every registered collection".
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub time_of_day: (u8, u8),
    pub collections: Vec<String>,
}

/// Flush scheduler and lease tuning (§6 "Configuration surface").
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub flush_interval: Duration,
    pub lru_low_watermark: u64,
    pub lru_high_watermark: u64,
    pub lease_ttl: Duration,
    pub page_size: u64,
    pub schedule: Vec<ScheduleEntry>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(5),
            lru_low_watermark: 10_000,
            lru_high_watermark: 15_000,
            lease_ttl: Duration::from_secs(10),
            page_size: 1_000,
            schedule: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    pub fn watermarks(mut self, low: u64, high: u64) -> Self {
        self.config.lru_low_watermark = low;
        self.config.lru_high_watermark = high;
        self
    }

    pub fn lease_ttl(mut self, ttl: Duration) -> Self {
        self.config.lease_ttl = ttl;
        self
    }

    pub fn page_size(mut self, size: u64) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn schedule_entry(mut self, hour: u8, minute: u8, collections: Vec<String>) -> Self {
        self.config.schedule.push(ScheduleEntry { time_of_day: (hour, minute), collections });
        self
    }

    pub fn build(self) -> SchedulerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = SchedulerConfig::builder()
            .flush_interval(Duration::from_secs(1))
            .watermarks(5, 10)
            .page_size(100)
            .schedule_entry(3, 0, vec!["tags".to_string()])
            .build();

        assert_eq!(config.flush_interval, Duration::from_secs(1));
        assert_eq!(config.lru_low_watermark, 5);
        assert_eq!(config.lru_high_watermark, 10);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.schedule.len(), 1);
        assert_eq!(config.schedule[0].time_of_day, (3, 0));
    }
}
