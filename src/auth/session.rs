//! The per-request view of a [`Session`].
//!
//! The session middleware puts a [`SessionHandle`] into the request extensions
//! before the handler runs, and reads it back afterwards to decide whether the
//! store needs updating and a cookie needs sending.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::model::{
    session::{Session, Token},
    user,
};

#[derive(Clone, Debug)]
pub struct SessionHandle(Arc<Mutex<Inner>>);

#[derive(Debug)]
struct Inner {
    session: Session,
    /// Whether the store already has a row for `session.token`.
    persisted: bool,
    modified: bool,
    /// A previously persisted token that was rotated out.
    stale_token: Option<Token>,
}

/// The work left for the middleware once the handler is done.
#[derive(Debug, Default)]
pub struct Commit {
    pub delete: Option<Token>,
    pub save: Option<Session>,
}

impl SessionHandle {
    /// Wrap a session that was loaded from the store.
    pub fn existing(session: Session) -> SessionHandle {
        SessionHandle::wrap(session, true)
    }

    /// Wrap a brand new session. It is only stored if something touches it.
    pub fn fresh(session: Session) -> SessionHandle {
        SessionHandle::wrap(session, false)
    }

    fn wrap(session: Session, persisted: bool) -> SessionHandle {
        SessionHandle(Arc::new(Mutex::new(Inner {
            session,
            persisted,
            modified: false,
            stale_token: None,
        })))
    }

    pub async fn user_id(&self) -> Option<user::Id> {
        self.0.lock().await.session.data.user_id
    }

    pub async fn is_authenticated(&self) -> bool {
        self.user_id().await.is_some()
    }

    pub async fn put_user_id(&self, id: user::Id) {
        let mut inner = self.0.lock().await;
        inner.session.data.user_id = Some(id);
        inner.modified = true;
    }

    pub async fn remove_user_id(&self) {
        let mut inner = self.0.lock().await;
        if inner.session.data.user_id.take().is_some() {
            inner.modified = true;
        }
    }

    pub async fn put_flash(&self, message: impl Into<String>) {
        let mut inner = self.0.lock().await;
        inner.session.data.flash = Some(message.into());
        inner.modified = true;
    }

    /// Take the flash message, if any. It will not be returned again.
    pub async fn pop_flash(&self) -> Option<String> {
        let mut inner = self.0.lock().await;
        let flash = inner.session.data.flash.take();
        if flash.is_some() {
            inner.modified = true;
        }
        flash
    }

    /// The CSRF token to embed in forms.
    ///
    /// A fresh session becomes worth storing once its token has been handed out,
    /// otherwise the next POST would have nothing to compare against.
    pub async fn csrf_token(&self) -> String {
        let mut inner = self.0.lock().await;
        if !inner.persisted {
            inner.modified = true;
        }
        inner.session.data.csrf_token.clone()
    }

    /// The CSRF token a submitted form must match. Does not mark the session modified.
    pub async fn expected_csrf_token(&self) -> Option<String> {
        let inner = self.0.lock().await;
        inner.persisted.then(|| inner.session.data.csrf_token.clone())
    }

    /// Issue a new session token, keeping the data.
    /// Call this whenever the authentication state changes.
    pub async fn renew_token(&self) {
        let mut inner = self.0.lock().await;
        let old = inner.session.renew();
        if inner.persisted && inner.stale_token.is_none() {
            inner.stale_token = Some(old);
        }
        inner.persisted = false;
        inner.modified = true;
    }

    /// Collect the pending store updates, resetting the handle to unmodified.
    pub async fn commit(&self) -> Commit {
        let mut inner = self.0.lock().await;

        let delete = inner.stale_token.take();
        let save = if inner.modified {
            inner.modified = false;
            inner.persisted = true;
            Some(inner.session.clone())
        } else {
            None
        };

        Commit { delete, save }
    }
}
