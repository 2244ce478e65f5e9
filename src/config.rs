//! Boot-time kernel configuration.

use crate::error::{Error, Result};

/// Which priority model the scheduler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Static priorities with priority donation through locks.
    #[default]
    Priority,
    /// Multi-level feedback queue: priorities decay with recent CPU usage.
    Mlfqs,
}

/// Scheduler parameters, fixed for the lifetime of a [`Manager`](crate::thread::Manager).
#[derive(Debug, Clone)]
pub struct Config {
    pub policy: Policy,
    /// Timer ticks a thread may run before it is preempted.
    pub time_slice: u32,
    /// Timer ticks per second.
    pub timer_freq: u32,
    /// Size of the thread page pool, the initial and idle threads included.
    pub max_threads: usize,
    /// Maximum length of a donation chain.
    pub donation_depth: usize,
}

pub const TIME_SLICE: u32 = 4;
pub const TIMER_FREQ: u32 = 100;
pub const MAX_THREADS: usize = 64;
pub const DONATION_DEPTH: usize = 8;

impl Default for Config {
    fn default() -> Self {
        Self {
            policy: Policy::Priority,
            time_slice: TIME_SLICE,
            timer_freq: TIMER_FREQ,
            max_threads: MAX_THREADS,
            donation_depth: DONATION_DEPTH,
        }
    }
}

impl Config {
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_time_slice(mut self, ticks: u32) -> Self {
        self.time_slice = ticks;
        self
    }

    pub fn with_timer_freq(mut self, freq: u32) -> Self {
        self.timer_freq = freq;
        self
    }

    pub fn with_max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn with_donation_depth(mut self, depth: usize) -> Self {
        self.donation_depth = depth;
        self
    }

    pub fn mlfqs(&self) -> bool {
        self.policy == Policy::Mlfqs
    }

    /// Parses kernel command-line options.
    ///
    /// Recognised options are `-o mlfqs`, `-slice=N`, `-freq=N`,
    /// `-threads=N` and `-depth=N`; anything else is rejected.
    pub fn from_cmdline(cmdline: &str) -> Result<Self> {
        let mut config = Config::default();
        let mut words = cmdline.split_whitespace();

        while let Some(word) = words.next() {
            if word == "-o" {
                match words.next() {
                    Some("mlfqs") => config.policy = Policy::Mlfqs,
                    Some(other) => return Err(Error::InvalidConfig(format!("-o {other}"))),
                    None => return Err(Error::InvalidConfig("-o".into())),
                }
                continue;
            }

            let (key, value) = word
                .split_once('=')
                .ok_or_else(|| Error::InvalidConfig(word.into()))?;
            let value: usize = value
                .parse()
                .map_err(|_| Error::InvalidConfig(word.into()))?;
            if value == 0 {
                return Err(Error::InvalidConfig(word.into()));
            }

            match key {
                "-slice" => config.time_slice = value as u32,
                "-freq" => config.timer_freq = value as u32,
                "-threads" => config.max_threads = value,
                "-depth" => config.donation_depth = value,
                _ => return Err(Error::InvalidConfig(word.into())),
            }
        }

        // Room for the initial and idle threads is mandatory.
        if config.max_threads < 2 {
            return Err(Error::InvalidConfig(format!(
                "-threads={}",
                config.max_threads
            )));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.policy, Policy::Priority);
        assert_eq!(config.time_slice, 4);
        assert_eq!(config.timer_freq, 100);
        assert!(!config.mlfqs());
    }

    #[test]
    fn empty_cmdline_is_default() {
        let config = Config::from_cmdline("").unwrap();
        assert_eq!(config.policy, Policy::Priority);
        assert_eq!(config.max_threads, MAX_THREADS);
    }

    #[test]
    fn parses_options() {
        let config = Config::from_cmdline("-o mlfqs -slice=8 -threads=16 -depth=4").unwrap();
        assert!(config.mlfqs());
        assert_eq!(config.time_slice, 8);
        assert_eq!(config.max_threads, 16);
        assert_eq!(config.donation_depth, 4);
        assert_eq!(config.timer_freq, TIMER_FREQ);
    }

    #[test]
    fn rejects_unknown() {
        assert!(matches!(
            Config::from_cmdline("-o fifo"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Config::from_cmdline("-quantum=3"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Config::from_cmdline("-slice=abc"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Config::from_cmdline("-threads=1"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Config::from_cmdline("-o"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn builder() {
        let config = Config::default()
            .with_policy(Policy::Mlfqs)
            .with_time_slice(2)
            .with_max_threads(3);
        assert!(config.mlfqs());
        assert_eq!(config.time_slice, 2);
        assert_eq!(config.max_threads, 3);
    }
}
