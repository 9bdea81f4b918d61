use crate::message::ResponseHead;

/// Decides, after the origin produced a response, whether to skip persisting
/// it. Evaluated on the head only; the body must remain deliverable to the
/// caller untouched.
pub trait Discarder: Send + Sync {
    fn discard(&self, head: &ResponseHead) -> bool;
}

impl<F> Discarder for F
where
    F: Fn(&ResponseHead) -> bool + Send + Sync,
{
    fn discard(&self, head: &ResponseHead) -> bool {
        self(head)
    }
}

/// Default policy: discard informational responses and server errors, cache
/// everything from 200 through 499 inclusive.
pub struct StatusDiscarder;

impl Discarder for StatusDiscarder {
    fn discard(&self, head: &ResponseHead) -> bool {
        let code = head.status.as_u16();
        code < 200 || code >= 500
    }
}
