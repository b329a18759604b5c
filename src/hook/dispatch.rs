//! Hook event dispatching

use super::{HookEvent, HookHandler, HookInput, HookResult};

/// Dispatch a hook event to all registered handlers
///
/// The first `Block` wins immediately. Otherwise the first `Feedback` is
/// returned after every handler has run.
pub fn dispatch(event: HookEvent, input: &HookInput, handlers: &[Box<dyn HookHandler>]) -> HookResult {
    let mut outcome = HookResult::Allow;

    for handler in handlers {
        if !handler.handles(event) {
            continue;
        }

        let result = handler.handle(event, input);
        match &result {
            HookResult::Block { reason } => {
                log::info!("Hook blocked by {}: {}", handler.name(), reason);
                return result;
            }
            HookResult::Feedback { reason } => {
                log::info!("Hook feedback from {}: {}", handler.name(), reason);
                if outcome == HookResult::Allow {
                    outcome = result;
                }
            }
            HookResult::Error { message } => {
                log::error!("Hook error: {}", message);
                // Continue to next handler
            }
            HookResult::Allow => {
                // Continue to next handler
            }
        }
    }

    outcome
}
