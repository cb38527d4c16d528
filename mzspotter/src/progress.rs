use std::ops::{Add, AddAssign};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub samples: usize,
    pub ms1_spectra: usize,
    pub msn_spectra: usize,
    pub features: usize,
    pub monoisotopic_features: usize,
    pub character_groups: usize,
    pub ccs_assigned: usize,
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.samples += rhs.samples;
        self.ms1_spectra += rhs.ms1_spectra;
        self.msn_spectra += rhs.msn_spectra;
        self.features += rhs.features;
        self.monoisotopic_features += rhs.monoisotopic_features;
        self.character_groups += rhs.character_groups;
        self.ccs_assigned += rhs.ccs_assigned;
    }
}

/// What the processing threads tell the progress logger
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Loaded {
        sample: String,
        spectra: usize,
    },
    Spotting {
        sample: String,
        done: usize,
        total: usize,
    },
    SampleDone {
        sample: String,
        record: ProgressRecord,
    },
    Aligning {
        done: usize,
        total: usize,
    },
}

/// The percentage step between logged progress updates
const REPORT_STEP: usize = 10;

fn percent(done: usize, total: usize) -> usize {
    if total == 0 {
        100
    } else {
        (done * 100 / total).min(100)
    }
}

/// Log events from `receiver` until every sender has hung up, returning the summed
/// per-sample records
pub fn log_progress(receiver: Receiver<ProgressEvent>) -> ProgressRecord {
    let mut total = ProgressRecord::default();
    let mut last_spotting: Vec<(String, usize)> = Vec::new();
    let mut last_aligning: Option<usize> = None;
    for event in receiver {
        match event {
            ProgressEvent::Loaded { sample, spectra } => {
                info!("Loaded {sample} with {spectra} spectra");
            }
            ProgressEvent::Spotting { sample, done, total } => {
                let pct = percent(done, total);
                let step = pct / REPORT_STEP;
                match last_spotting.iter_mut().find(|(name, _)| *name == sample) {
                    Some((_, last)) if *last >= step => {}
                    Some((_, last)) => {
                        *last = step;
                        info!("{sample}: {pct}% of mass slices searched");
                    }
                    None => {
                        last_spotting.push((sample.clone(), step));
                        debug!("{sample}: started peak spotting over {total} mass slices");
                    }
                }
            }
            ProgressEvent::SampleDone { sample, record } => {
                info!(
                    "{sample}: {} features ({} monoisotopic) from {} MS1 and {} MSn spectra",
                    record.features,
                    record.monoisotopic_features,
                    record.ms1_spectra,
                    record.msn_spectra
                );
                total += record;
            }
            ProgressEvent::Aligning { done, total } => {
                let step = percent(done, total) / REPORT_STEP;
                match last_aligning {
                    Some(last) if last >= step => {}
                    _ => {
                        last_aligning = Some(step);
                        info!("Alignment: {done}/{total} samples gap filled");
                    }
                }
            }
        }
    }
    total
}

/// Start the progress logger on its own thread
pub fn spawn_progress_logger() -> (Sender<ProgressEvent>, JoinHandle<ProgressRecord>) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    let handle = thread::spawn(move || log_progress(receiver));
    (sender, handle)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn test_logger_sums_records() {
        let (sender, handle) = spawn_progress_logger();
        let record = ProgressRecord {
            samples: 1,
            features: 4,
            ..Default::default()
        };
        for i in 0..=10 {
            sender
                .send(ProgressEvent::Spotting {
                    sample: "a".into(),
                    done: i,
                    total: 10,
                })
                .unwrap();
        }
        sender
            .send(ProgressEvent::SampleDone {
                sample: "a".into(),
                record,
            })
            .unwrap();
        sender
            .send(ProgressEvent::SampleDone {
                sample: "b".into(),
                record,
            })
            .unwrap();
        drop(sender);
        let total = handle.join().unwrap();
        assert_eq!(total.samples, 2);
        assert_eq!(total.features, 8);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(5, 10), 50);
        assert_eq!(percent(12, 10), 100);
    }
}
