//! Parameter Resolver
//!
//! Turns a parameter source (ready list or async stream) into one concrete
//! list, then applies the force-optional relaxation and the owner's mapping.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use pmfm_core::{CoreError, ParameterList, ParameterSource, PmfmId};

use crate::cancel::CancelSignal;
use crate::error::FormError;

/// Resolves a source to its first non-empty list.
///
/// Returns `Ok(None)` when cancelled. A stream that ends without a
/// non-empty emission resolves to the last list it produced (or empty).
pub async fn await_first(source: ParameterSource, cancel: &CancelSignal) -> Result<Option<ParameterList>, FormError> {
    let mut stream = match source {
        ParameterSource::Ready(list) => return Ok(Some(list)),
        ParameterSource::Pending(stream) => stream,
    };

    let mut last = ParameterList::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            next = stream.next() => next,
        };
        match next {
            Some(Ok(list)) if !list.is_empty() => return Ok(Some(list)),
            Some(Ok(list)) => last = list,
            Some(Err(e)) => {
                warn!("Parameter source failed: {}", e);
                return Err(FormError::CatalogLoad(e.to_string()));
            }
            None => {
                debug!("Parameter source ended after {} parameter(s)", last.len());
                return Ok(Some(last));
            }
        }
    }
}

/// Returns a list where every non-excluded spec is optional. Specs that
/// already are optional (or excluded) are shared, never copied; the input
/// specs are never mutated.
pub fn force_optional(parameters: &[Arc<pmfm_core::ParameterSpec>], excluded: &HashSet<PmfmId>) -> ParameterList {
    parameters
        .iter()
        .map(|spec| {
            if spec.required && !excluded.contains(&spec.id()) {
                Arc::new((**spec).clone().with_required(false))
            } else {
                Arc::clone(spec)
            }
        })
        .collect()
}

/// Channel-backed source: the sender side emits lists, the form consumes the
/// first non-empty one.
pub fn parameter_channel(buffer: usize) -> (mpsc::Sender<Result<ParameterList, CoreError>>, ParameterSource) {
    let (tx, rx) = mpsc::channel(buffer);
    (tx, ParameterSource::Pending(ReceiverStream::new(rx).boxed()))
}
