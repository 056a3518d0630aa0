//! IdGenerator port - job token generation.
//!
//! Tokens are ULIDs: sortable by creation time and safe to mint on any
//! producer without coordination.

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::JobToken;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_token(&self) -> JobToken;
}

/// ULID tokens stamped with the given clock's time.
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_token(&self) -> JobToken {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        JobToken::from(ulid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn generated_tokens_are_unique() {
        let id_gen = UlidGenerator::new(Arc::new(SystemClock));

        let t1 = id_gen.generate_token();
        let t2 = id_gen.generate_token();
        let t3 = id_gen.generate_token();

        assert_ne!(t1, t2);
        assert_ne!(t2, t3);
        assert_ne!(t1, t3);
    }

    #[test]
    fn fixed_clock_fixes_the_timestamp_part() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(Arc::new(FixedClock::new(fixed_time)));

        let t1 = id_gen.generate_token();
        let t2 = id_gen.generate_token();

        // random part still differs
        assert_ne!(t1, t2);

        let u1 = Ulid::from_string(t1.as_str()).unwrap();
        let u2 = Ulid::from_string(t2.as_str()).unwrap();
        assert_eq!(u1.timestamp_ms(), u2.timestamp_ms());
        assert_eq!(u1.timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
