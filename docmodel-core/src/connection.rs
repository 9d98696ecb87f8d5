//! Connection state shared by every model instance.
//!
//! A [`Connection`] is a cheap, cloneable handle to one store backend. The process-wide
//! slot managed by [`install`], [`current`] and [`close`] holds the connection that
//! `Instance::new` uses; code that wants isolation (tests in particular) can skip the
//! slot entirely and pass a [`Connection`] explicitly.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{connection::{self, Connection}, memory::InMemoryStore};
//!
//! connection::install(Connection::new(InMemoryStore::new())).await;
//! let users = connection::current().await?.collection::<User>();
//! connection::close().await?;
//! ```

use std::{
    fmt,
    sync::{
        Arc, LazyLock,
        atomic::{AtomicBool, Ordering},
    },
};

use mea::rwlock::RwLock;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::ModelCollection,
    error::{ModelError, ModelResult},
    schema::Model,
};

static CURRENT: LazyLock<RwLock<Option<Connection>>> = LazyLock::new(|| RwLock::new(None));

/// A shared handle to a store backend.
///
/// Clones share the backend and its closed state: once any clone is shut down, every
/// facade built from any of them reports [`ModelError::NotConnected`].
#[derive(Clone)]
pub struct Connection {
    backend: Arc<Box<dyn DynStoreBackend>>,
    closed: Arc<AtomicBool>,
}

impl Connection {
    pub fn new<B: StoreBackend + 'static>(backend: B) -> Self {
        Self::from_boxed(Box::new(backend))
    }

    pub fn from_boxed(backend: Box<dyn DynStoreBackend>) -> Self {
        Self {
            backend: Arc::new(backend),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Name of the logical database the backend is bound to.
    pub fn namespace(&self) -> &str {
        self.backend.namespace()
    }

    pub fn backend(&self) -> &dyn DynStoreBackend {
        self.backend.as_ref().as_ref()
    }

    /// The backend, unless this connection has been shut down.
    pub fn open_backend(&self) -> ModelResult<&dyn DynStoreBackend> {
        if self.is_closed() {
            return Err(ModelError::NotConnected);
        }

        Ok(self.backend())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The facade for `M`'s resolved collection.
    pub fn collection<M: Model>(&self) -> ModelCollection<M> {
        ModelCollection::new(M::schema().collection_name().to_string(), self.clone())
    }

    /// The facade for `M` bound to an explicit collection.
    pub fn collection_named<M: Model>(&self, name: impl Into<String>) -> ModelCollection<M> {
        ModelCollection::new(name.into(), self.clone())
    }

    /// Shuts the backend down and marks every clone of this handle closed.
    ///
    /// Only the first call reaches the backend; later calls return `Ok(())`.
    pub async fn shutdown(&self) -> ModelResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(namespace = self.namespace(), "connection already shut down");
            return Ok(());
        }

        self.backend.shutdown().await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("namespace", &self.namespace())
            .field("backend", &self.backend)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Makes `connection` the process-wide connection, returning the one it replaced.
pub async fn install(connection: Connection) -> Option<Connection> {
    tracing::info!(namespace = connection.namespace(), "installing connection");

    CURRENT.write().await.replace(connection)
}

/// Returns the process-wide connection.
///
/// # Errors
///
/// Returns [`ModelError::NotConnected`] if nothing has been installed.
pub async fn current() -> ModelResult<Connection> {
    CURRENT
        .read()
        .await
        .clone()
        .ok_or(ModelError::NotConnected)
}

/// Whether a process-wide connection is installed.
pub async fn is_connected() -> bool {
    CURRENT.read().await.is_some()
}

/// Removes the process-wide connection and shuts its backend down.
///
/// Closing when nothing is installed is a no-op.
pub async fn close() -> ModelResult<()> {
    let taken = CURRENT.write().await.take();

    match taken {
        Some(connection) => {
            tracing::info!(namespace = connection.namespace(), "closing connection");
            connection.shutdown().await
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    use crate::{field::StringField, schema::Schema, testing::RecordingBackend};

    struct Memo;

    impl Model for Memo {
        fn schema() -> &'static Schema {
            static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
                Schema::builder("Memo")
                    .field("body", StringField::new(doc! {}))
                    .build()
                    .unwrap()
            });

            &SCHEMA
        }
    }

    #[tokio::test]
    async fn test_shutdown_reaches_backend_while_shared() {
        let backend = RecordingBackend::default();
        let calls = backend.calls();
        let connection = Connection::new(backend);
        let held = connection.clone();

        connection.shutdown().await.unwrap();
        held.shutdown().await.unwrap();

        assert_eq!(*calls.lock().unwrap(), ["shutdown recording"]);
        assert!(held.is_closed());
        assert!(matches!(held.open_backend(), Err(ModelError::NotConnected)));
    }

    // The only test in this crate that touches the process-wide slot.
    #[tokio::test]
    async fn test_close_shuts_down_installed_backend() {
        let backend = RecordingBackend::default();
        let calls = backend.calls();
        let connection = Connection::new(backend);

        assert!(install(connection.clone()).await.is_none());
        assert!(is_connected().await);

        close().await.unwrap();

        assert!(!is_connected().await);
        assert!(matches!(current().await, Err(ModelError::NotConnected)));
        assert_eq!(*calls.lock().unwrap(), ["shutdown recording"]);
        assert!(matches!(
            connection.collection::<Memo>().find(doc! {}, None).await,
            Err(ModelError::NotConnected)
        ));
    }
}
