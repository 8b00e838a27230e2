//! Finds the application's re-engagement import segment.

use reengage_core::config::AmbiguityPolicy;
use reengage_core::types::Segment;
use reengage_core::{ReengageError, ReengageResult};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentResolver {
    policy: AmbiguityPolicy,
}

impl SegmentResolver {
    pub fn new(policy: AmbiguityPolicy) -> Self {
        Self { policy }
    }

    /// First `IMPORT` segment tagged `REENGAGEMENT=YES`, in service order.
    ///
    /// More than one match is logged under `FirstMatch` and rejected under
    /// `Reject`.
    pub fn resolve<'a>(
        &self,
        application_id: &str,
        segments: &'a [Segment],
    ) -> ReengageResult<Option<&'a Segment>> {
        let mut matches = segments.iter().filter(|s| s.is_reengagement_import());
        let Some(first) = matches.next() else {
            return Ok(None);
        };

        let others: Vec<&Segment> = matches.collect();
        if others.is_empty() {
            return Ok(Some(first));
        }

        let ids: Vec<String> = std::iter::once(first)
            .chain(others)
            .map(|s| s.id.clone())
            .collect();
        match self.policy {
            AmbiguityPolicy::FirstMatch => {
                warn!(
                    application_id = %application_id,
                    chosen = %first.id,
                    matches = ?ids,
                    "multiple re-engagement segments found, using first"
                );
                Ok(Some(first))
            }
            AmbiguityPolicy::Reject => Err(ReengageError::ResolutionAmbiguity {
                application_id: application_id.to_string(),
                matches: ids,
            }),
        }
    }
}
