//! The COMDAT engine (§4.6): per object file, records a content digest and
//! walks the ELF section table for link-once groups.

use std::sync::Arc;

use scan_core::error::ScanError;
use scan_core::provider;
use scan_core::tempdir::ScopedTempFile;
use scan_core::WorkItem;

use crate::aggregate::{AggregationMap, DigestAggregator};

/// Shared state every worker dispatches into; cheap to clone (an `Arc` pair).
#[derive(Clone)]
pub struct Engine {
    pub aggregation: Arc<AggregationMap>,
    pub digests: Arc<DigestAggregator>,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            aggregation: Arc::new(AggregationMap::new()),
            digests: Arc::new(DigestAggregator::new()),
        }
    }

    /// Processes one work item end to end (§4.5 steps 1-3): extract a zip
    /// member to a scoped temp file if needed, skip empty files, then hand
    /// every logical object (the whole file, or each static-archive member)
    /// to [`Self::process_object`].
    pub fn process_item(&self, item: WorkItem) -> Result<(), ScanError> {
        let _scoped; // keeps the extracted temp file alive for this call only
        let path_for_errors = item.real_path.clone();

        let bytes: Vec<u8> = if item.is_zip_member() {
            let archive_bytes = std::fs::read(&item.real_path).map_err(|e| ScanError::Skip {
                path: path_for_errors.clone(),
                reason: e.to_string(),
            })?;
            let mut archive = zip::ZipArchive::new(std::io::Cursor::new(archive_bytes))
                .map_err(|e| ScanError::Skip {
                    path: path_for_errors.clone(),
                    reason: e.to_string(),
                })?;
            let mut member = archive
                .by_name(&item.member_name)
                .map_err(|e| ScanError::Skip {
                    path: path_for_errors.clone(),
                    reason: format!("missing zip member {}: {e}", item.member_name),
                })?;
            let mut data = Vec::new();
            std::io::copy(&mut member, &mut data).map_err(|e| ScanError::Skip {
                path: path_for_errors.clone(),
                reason: e.to_string(),
            })?;
            let scoped = ScopedTempFile::create(&data).map_err(|e| ScanError::Skip {
                path: path_for_errors.clone(),
                reason: e.to_string(),
            })?;
            _scoped = Some(scoped);
            data
        } else {
            _scoped = None;
            std::fs::read(&item.real_path).map_err(|e| ScanError::Skip {
                path: path_for_errors.clone(),
                reason: e.to_string(),
            })?
        };

        if bytes.is_empty() {
            log::debug!("skipping empty file: {}", item.display_path);
            return Ok(());
        }

        let members = provider::enumerate_archive_members(&bytes).map_err(|e| annotate(e, &item.display_path))?;
        for member in &members {
            self.process_object(member.data, &item.display_path)
                .map_err(|e| annotate(e, &item.display_path))?;
        }
        Ok(())
    }

    fn process_object(&self, data: &[u8], display_path: &str) -> Result<(), ScanError> {
        self.digests.record_file(data);

        let groups = match provider::comdat_groups(data) {
            Ok(groups) => groups,
            Err(e) if matches!(e, ScanError::Skip { .. }) => {
                log::warn!("skipping non-ELF member in {display_path}: {e}");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        for group in groups {
            self.aggregation.record(&group.identifier, group.total_size);
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn annotate(e: ScanError, display_path: &str) -> ScanError {
    match e {
        ScanError::Skip { reason, .. } => ScanError::Skip {
            path: display_path.into(),
            reason,
        },
        ScanError::FatalParse { reason, .. } => ScanError::FatalParse {
            path: display_path.into(),
            reason,
        },
        other => other,
    }
}
