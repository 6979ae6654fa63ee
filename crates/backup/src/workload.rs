//! Deterministic workload generators

use wr_core::{Round, SessionResult, TableWriter};

/// Writes a reproducible key/value set for a round
pub trait Workload {
    fn apply(&self, writer: &mut dyn TableWriter, round: Round) -> SessionResult<()>;
}

/// Inserts `key.<round>.<i>` -> `value.<round>.<i>` for `i in 0..keys_per_round`
#[derive(Debug, Clone, Copy)]
pub struct KeyValueWorkload {
    pub keys_per_round: u32,
}

impl KeyValueWorkload {
    pub fn new(keys_per_round: u32) -> Self {
        Self { keys_per_round }
    }

    pub fn key(round: Round, i: u32) -> String {
        format!("key.{}.{}", round, i)
    }

    pub fn value(round: Round, i: u32) -> String {
        format!("value.{}.{}", round, i)
    }
}

impl Workload for KeyValueWorkload {
    fn apply(&self, writer: &mut dyn TableWriter, round: Round) -> SessionResult<()> {
        for i in 0..self.keys_per_round {
            writer.insert(&Self::key(round, i), &Self::value(round, i))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MapWriter(BTreeMap<String, String>);

    impl TableWriter for MapWriter {
        fn insert(&mut self, key: &str, value: &str) -> SessionResult<()> {
            self.0.insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_workload_is_reproducible() {
        let workload = KeyValueWorkload::new(3);
        let mut first = MapWriter::default();
        let mut second = MapWriter::default();

        workload.apply(&mut first, Round(2)).unwrap();
        workload.apply(&mut second, Round(2)).unwrap();
        workload.apply(&mut second, Round(2)).unwrap();

        assert_eq!(first.0, second.0);
        assert_eq!(first.0.len(), 3);
        assert_eq!(first.0["key.2.1"], "value.2.1");
    }

    #[test]
    fn test_zero_keys_writes_nothing() {
        let mut writer = MapWriter::default();
        KeyValueWorkload::new(0).apply(&mut writer, Round::ZERO).unwrap();
        assert!(writer.0.is_empty());
    }
}
