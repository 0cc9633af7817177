//! Upload stability probing.
//!
//! Synced folders (OneDrive, SharePoint, SMB shares) surface a file before
//! its payload is complete. A label is only handed to extraction once two
//! consecutive size samples agree.

use std::io;
use std::path::Path;
use std::time::Duration;

/// Source of file size samples.
pub trait SizeProbe: Send + Sync {
    fn size(&self, path: &Path) -> io::Result<u64>;
}

/// Reads sizes from filesystem metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSizeProbe;

impl SizeProbe for FsSizeProbe {
    fn size(&self, path: &Path) -> io::Result<u64> {
        std::fs::metadata(path).map(|meta| meta.len())
    }
}

/// Samples a file's size until it stops changing.
#[derive(Debug, Clone)]
pub struct StabilityProber<P = FsSizeProbe> {
    probe: P,
    samples: u32,
    interval: Duration,
}

impl StabilityProber<FsSizeProbe> {
    pub fn new(samples: u32, interval: Duration) -> Self {
        Self::with_probe(FsSizeProbe, samples, interval)
    }
}

impl<P: SizeProbe> StabilityProber<P> {
    pub fn with_probe(probe: P, samples: u32, interval: Duration) -> Self {
        Self {
            probe,
            samples,
            interval,
        }
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// True once two consecutive samples report the same size.
    ///
    /// A failed read breaks the run of equal samples but does not end the
    /// probe; only running out of samples does.
    pub async fn is_stable(&self, path: &Path) -> bool {
        let mut last: Option<u64> = None;

        for sample in 1..=self.samples {
            match self.probe.size(path) {
                Ok(size) => {
                    if last == Some(size) {
                        crate::debug_event!(
                            "stability",
                            "stable",
                            "{} at {size} bytes after {sample} samples",
                            path.display()
                        );
                        return true;
                    }
                    last = Some(size);
                }
                Err(e) => {
                    crate::debug_event!("stability", "probe failed", "{}: {e}", path.display());
                    last = None;
                }
            }

            if sample < self.samples {
                tokio::time::sleep(self.interval).await;
            }
        }

        false
    }
}
