use std::cell::RefCell;
use std::rc::Rc;

use super::{Permission, PermissionErrorKind, PermissionGateway, PermissionOutcome, RequestId};

/// How a [`StaticPermissionGateway`] answers `is_granted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionPolicy {
    /// Desktop hosts have no runtime permissions: always granted.
    AlreadyGranted,
    /// Report missing and record requests; the host answers them later.
    Prompt,
    /// Fail every request synchronously with the given error.
    Unavailable(PermissionErrorKind),
}

/// Permission gateway for desktop hosts, the CLI and tests.
///
/// Requests are recorded in a shared log so the caller can inspect what the
/// session asked for and answer it through the session.
#[derive(Debug, Clone)]
pub struct StaticPermissionGateway {
    policy: PermissionPolicy,
    requests: Rc<RefCell<Vec<RequestId>>>,
}

impl StaticPermissionGateway {
    pub fn new(policy: PermissionPolicy) -> Self {
        Self {
            policy,
            requests: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn granted() -> Self {
        Self::new(PermissionPolicy::AlreadyGranted)
    }

    pub fn prompting() -> Self {
        Self::new(PermissionPolicy::Prompt)
    }

    /// Shared handle to the request log.
    pub fn request_log(&self) -> Rc<RefCell<Vec<RequestId>>> {
        Rc::clone(&self.requests)
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl PermissionGateway for StaticPermissionGateway {
    fn is_granted(&self, _permission: Permission) -> bool {
        self.policy == PermissionPolicy::AlreadyGranted
    }

    fn request(&mut self, permission: Permission, id: RequestId) -> Result<(), PermissionOutcome> {
        if let PermissionPolicy::Unavailable(kind) = self.policy {
            log::warn!("[Permission] {} unavailable: {:?}", permission.id(), kind);
            return Err(PermissionOutcome::Error(kind));
        }
        log::debug!("[Permission] Requesting {} ({:?})", permission.id(), id);
        self.requests.borrow_mut().push(id);
        Ok(())
    }
}
