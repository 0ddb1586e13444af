//! Default values for configuration fields

use std::time::Duration;

pub fn connect_timeout() -> Duration {
    Duration::from_secs(10)
}

pub fn read_timeout() -> Duration {
    Duration::from_secs(10)
}

pub fn write_timeout() -> Duration {
    Duration::from_secs(10)
}

pub fn pool_size() -> usize {
    10
}

pub fn idle_timeout() -> Duration {
    Duration::from_secs(60)
}
