//! Handle lifecycle for one remote object per session
//!
//! A session is either fully open (capability set resolved and a durable
//! instance held) or holds nothing. Every failure path of `open` rolls back
//! what it acquired.

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::remote::RemoteBinding;

pub struct Session<B: RemoteBinding> {
    binding: B,
    resolved: bool,
    instance: Option<B::Instance>,
}

impl<B: RemoteBinding> Session<B> {
    pub fn new(binding: B) -> Self {
        Session {
            binding,
            resolved: false,
            instance: None,
        }
    }

    /// Resolves the capability set and constructs the remote instance.
    pub fn open<F>(&mut self, construct: F) -> Result<()>
    where
        F: FnOnce(&mut B) -> Result<B::Instance>,
    {
        if self.instance.is_some() {
            return Err(Error::invalid_argument("session already open"));
        }

        self.binding.resolve()?;
        self.resolved = true;

        match construct(&mut self.binding) {
            Ok(instance) => {
                self.instance = Some(instance);
                Ok(())
            }
            Err(e) => {
                self.release_binding();
                Err(e)
            }
        }
    }

    pub fn close(&mut self) -> Result<()> {
        self.close_with(|_| {})
    }

    /// Closes the remote instance, then runs `before_release` ahead of
    /// releasing the durable reference and capability set.
    ///
    /// A failing remote close is reported as `RemoteCall` but never stops
    /// the local release. Closing a session that holds nothing succeeds.
    pub fn close_with<F>(&mut self, before_release: F) -> Result<()>
    where
        F: FnOnce(&mut B),
    {
        let Some(instance) = self.instance.take() else {
            self.release_binding();
            return Ok(());
        };

        let closed = self.binding.close_instance(&instance);
        before_release(&mut self.binding);
        self.binding.release_instance(instance);
        self.release_binding();

        closed.map_err(|e| {
            warn!("remote close failed: {}", e);
            match e {
                e @ Error::RemoteCall(_) => e,
                other => Error::RemoteCall(other.to_string()),
            }
        })
    }

    /// Rollback path: releases everything without calling the remote close.
    pub fn abandon_with<F>(&mut self, before_release: F)
    where
        F: FnOnce(&mut B),
    {
        if let Some(instance) = self.instance.take() {
            debug!("abandoning remote instance");
            before_release(&mut self.binding);
            self.binding.release_instance(instance);
        }
        self.release_binding();
    }

    /// The binding together with the live instance, if open.
    pub fn parts(&mut self) -> Option<(&mut B, &B::Instance)> {
        match self.instance {
            Some(ref instance) => Some((&mut self.binding, instance)),
            None => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.instance.is_some()
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    fn release_binding(&mut self) {
        if self.resolved {
            self.binding.release();
            self.resolved = false;
        }
    }
}

impl<B: RemoteBinding> Drop for Session<B> {
    fn drop(&mut self) {
        if self.is_open() {
            let _ = self.close();
        }
    }
}
