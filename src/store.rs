//! Single-writer local databases.
//!
//! Each [`Database`] is owned by one tokio task. Callers talk to it through a
//! mailbox and await replies, so reads and writes never race on the records
//! or on the backing file.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, oneshot};

use crate::{ActitoError, Result};

/// A record kept in a [`Database`].
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Key: PartialEq + Clone + Send + fmt::Debug + 'static;

    /// Bumping this discards every stored record on the next open.
    const SCHEMA_VERSION: u32;

    fn key(&self) -> Self::Key;
}

type Reply<T> = oneshot::Sender<Result<T>>;
type Mutator<T> = Box<dyn FnMut(&mut T) + Send>;
type Predicate<T> = Box<dyn FnMut(&T) -> bool + Send>;

enum Command<T: Entity> {
    Insert(T, Reply<()>),
    FetchAll(Reply<Vec<T>>),
    Find(T::Key, Reply<Option<T>>),
    Update(T, Reply<bool>),
    Modify(Option<T::Key>, Mutator<T>, Reply<usize>),
    Remove(T::Key, Reply<bool>),
    Retain(Predicate<T>, Reply<usize>),
    ReplaceAll(Vec<T>, Reply<()>),
    Clear(Reply<()>),
}

#[derive(Serialize)]
struct FileOut<'a, T> {
    version: u32,
    records: &'a [T],
}

#[derive(Deserialize)]
struct FileIn {
    version: u32,
    #[serde(default)]
    records: Vec<JsonValue>,
}

/// Handle to a database task. Cheap to clone.
pub struct Database<T: Entity> {
    name: String,
    tx: mpsc::UnboundedSender<Command<T>>,
}

impl<T: Entity> Clone for Database<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<T: Entity> fmt::Debug for Database<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T: Entity> Database<T> {
    /// Opens `<dir>/<name>.json`, or a memory-only database when `dir` is
    /// `None`, and spawns the task owning it.
    ///
    /// A file written with another schema version, or one that cannot be
    /// parsed, is rebuilt empty. Records that fail to decode are dropped.
    pub async fn open(name: &str, dir: Option<&Path>) -> Result<Self> {
        let path = dir.map(|dir| dir.join(format!("{name}.json")));
        let records = match &path {
            Some(path) => load::<T>(name, path).await?,
            None => Vec::new(),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            name: name.to_owned(),
            path,
            records,
        };
        tokio::spawn(worker.run(rx));

        Ok(Self {
            name: name.to_owned(),
            tx,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn insert(&self, record: T) -> Result<()> {
        self.call(|reply| Command::Insert(record, reply)).await
    }

    pub async fn fetch_all(&self) -> Result<Vec<T>> {
        self.call(Command::FetchAll).await
    }

    pub async fn find(&self, key: T::Key) -> Result<Option<T>> {
        self.call(|reply| Command::Find(key, reply)).await
    }

    /// Replaces the stored record with the same key. Returns `false` when
    /// no such record exists.
    pub async fn update(&self, record: T) -> Result<bool> {
        self.call(|reply| Command::Update(record, reply)).await
    }

    /// Applies `f` to the record with `key`. Returns the number changed.
    pub async fn modify<F>(&self, key: T::Key, f: F) -> Result<usize>
    where
        F: FnMut(&mut T) + Send + 'static,
    {
        self.call(|reply| Command::Modify(Some(key), Box::new(f), reply))
            .await
    }

    /// Applies `f` to every record.
    pub async fn modify_all<F>(&self, f: F) -> Result<usize>
    where
        F: FnMut(&mut T) + Send + 'static,
    {
        self.call(|reply| Command::Modify(None, Box::new(f), reply))
            .await
    }

    /// Removes the record with `key`. Unknown keys are a no-op returning
    /// `false`.
    pub async fn remove(&self, key: T::Key) -> Result<bool> {
        self.call(|reply| Command::Remove(key, reply)).await
    }

    /// Keeps the records matching `keep`. Returns the number removed.
    pub async fn retain<F>(&self, keep: F) -> Result<usize>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        self.call(|reply| Command::Retain(Box::new(keep), reply))
            .await
    }

    pub async fn replace_all(&self, records: Vec<T>) -> Result<()> {
        self.call(|reply| Command::ReplaceAll(records, reply)).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.call(Command::Clear).await
    }

    async fn call<R>(&self, command: impl FnOnce(Reply<R>) -> Command<T>) -> Result<R> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(command(reply))
            .map_err(|_| ActitoError::StorageClosed)?;
        response.await.map_err(|_| ActitoError::StorageClosed)?
    }
}

struct Worker<T> {
    name: String,
    path: Option<PathBuf>,
    records: Vec<T>,
}

impl<T: Entity> Worker<T> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command<T>>) {
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!("database '{}' closed", self.name);
    }

    async fn handle(&mut self, command: Command<T>) {
        match command {
            Command::Insert(record, reply) => {
                let mut next = self.records.clone();
                let key = record.key();
                match next.iter_mut().find(|existing| existing.key() == key) {
                    Some(existing) => *existing = record,
                    None => next.push(record),
                }
                let _ = reply.send(self.commit(next).await);
            }
            Command::FetchAll(reply) => {
                let _ = reply.send(Ok(self.records.clone()));
            }
            Command::Find(key, reply) => {
                let found = self.records.iter().find(|record| record.key() == key);
                let _ = reply.send(Ok(found.cloned()));
            }
            Command::Update(record, reply) => {
                let key = record.key();
                let Some(index) = self.records.iter().position(|r| r.key() == key) else {
                    let _ = reply.send(Ok(false));
                    return;
                };
                let mut next = self.records.clone();
                next[index] = record;
                let _ = reply.send(self.commit(next).await.map(|_| true));
            }
            Command::Modify(key, mut f, reply) => {
                let mut next = self.records.clone();
                let mut changed = 0;
                for record in next.iter_mut() {
                    if key.as_ref().map_or(true, |key| record.key() == *key) {
                        f(record);
                        changed += 1;
                    }
                }
                if changed == 0 {
                    let _ = reply.send(Ok(0));
                    return;
                }
                let _ = reply.send(self.commit(next).await.map(|_| changed));
            }
            Command::Remove(key, reply) => {
                let Some(index) = self.records.iter().position(|r| r.key() == key) else {
                    let _ = reply.send(Ok(false));
                    return;
                };
                let mut next = self.records.clone();
                next.remove(index);
                let _ = reply.send(self.commit(next).await.map(|_| true));
            }
            Command::Retain(mut keep, reply) => {
                let mut next = self.records.clone();
                next.retain(|record| keep(record));
                let removed = self.records.len() - next.len();
                if removed == 0 {
                    let _ = reply.send(Ok(0));
                    return;
                }
                let _ = reply.send(self.commit(next).await.map(|_| removed));
            }
            Command::ReplaceAll(records, reply) => {
                let _ = reply.send(self.commit(records).await);
            }
            Command::Clear(reply) => {
                let _ = reply.send(self.commit(Vec::new()).await);
            }
        }
    }

    /// Persists `next` and makes it the current state. On failure the
    /// previous state stays current.
    async fn commit(&mut self, next: Vec<T>) -> Result<()> {
        if let Some(path) = &self.path {
            persist(path, T::SCHEMA_VERSION, &next).await?;
        }
        self.records = next;
        Ok(())
    }
}

async fn load<T: Entity>(name: &str, path: &Path) -> Result<Vec<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let file: FileIn = match serde_json::from_slice(&bytes) {
        Ok(file) => file,
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("database '{name}' is unreadable, rebuilding: {_err}");
            persist::<T>(path, T::SCHEMA_VERSION, &[]).await?;
            return Ok(Vec::new());
        }
    };

    if file.version != T::SCHEMA_VERSION {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "database '{name}' schema changed ({} -> {}), rebuilding",
            file.version,
            T::SCHEMA_VERSION
        );
        persist::<T>(path, T::SCHEMA_VERSION, &[]).await?;
        return Ok(Vec::new());
    }

    let mut records = Vec::with_capacity(file.records.len());
    for raw in file.records {
        match serde_json::from_value::<T>(raw) {
            Ok(record) => records.push(record),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("discarding corrupted record in database '{name}': {_err}");
            }
        }
    }

    #[cfg(not(feature = "tracing"))]
    let _ = name;

    Ok(records)
}

async fn persist<T: Serialize>(path: &Path, version: u32, records: &[T]) -> Result<()> {
    let bytes = serde_json::to_vec(&FileOut { version, records })
        .map_err(|err| ActitoError::Decode(format!("could not encode records: {err}")))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::{Database, Entity};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: u32,
        text: String,
    }

    impl Entity for Note {
        type Key = u32;
        const SCHEMA_VERSION: u32 = 1;

        fn key(&self) -> u32 {
            self.id
        }
    }

    fn note(id: u32, text: &str) -> Note {
        Note {
            id,
            text: text.to_owned(),
        }
    }

    #[tokio::test]
    async fn insert_update_remove_in_memory() {
        let db = Database::<Note>::open("notes", None).await.expect("open");

        db.insert(note(1, "a")).await.expect("insert");
        db.insert(note(2, "b")).await.expect("insert");
        assert!(db.update(note(1, "a2")).await.expect("update"));
        assert!(!db.update(note(9, "missing")).await.expect("update"));

        assert_eq!(
            db.find(1).await.expect("find"),
            Some(note(1, "a2"))
        );
        assert!(db.remove(2).await.expect("remove"));
        assert!(!db.remove(2).await.expect("second remove is a no-op"));
        assert_eq!(db.fetch_all().await.expect("all"), vec![note(1, "a2")]);
    }

    #[tokio::test]
    async fn insert_with_existing_key_replaces() {
        let db = Database::<Note>::open("notes", None).await.expect("open");
        db.insert(note(1, "a")).await.expect("insert");
        db.insert(note(1, "b")).await.expect("insert");
        assert_eq!(db.fetch_all().await.expect("all"), vec![note(1, "b")]);
    }

    #[tokio::test]
    async fn modify_and_retain() {
        let db = Database::<Note>::open("notes", None).await.expect("open");
        db.replace_all(vec![note(1, "a"), note(2, "b"), note(3, "c")])
            .await
            .expect("replace");

        let changed = db
            .modify(2, |n| n.text.push('!'))
            .await
            .expect("modify");
        assert_eq!(changed, 1);
        assert_eq!(db.modify(42, |_| {}).await.expect("modify"), 0);

        let removed = db.retain(|n| n.id != 3).await.expect("retain");
        assert_eq!(removed, 1);

        let all = db.modify_all(|n| n.text.make_ascii_uppercase()).await.expect("modify");
        assert_eq!(all, 2);
        assert_eq!(
            db.fetch_all().await.expect("all"),
            vec![note(1, "A"), note(2, "B!")]
        );
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let db = Database::<Note>::open("notes", Some(dir.path()))
                .await
                .expect("open");
            db.insert(note(1, "kept")).await.expect("insert");
        }

        let reopened = Database::<Note>::open("notes", Some(dir.path()))
            .await
            .expect("reopen");
        assert_eq!(reopened.fetch_all().await.expect("all"), vec![note(1, "kept")]);
    }

    #[tokio::test]
    async fn version_mismatch_rebuilds_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.json");
        std::fs::write(&path, r#"{"version":0,"records":[{"id":1,"text":"old"}]}"#)
            .expect("seed");

        let db = Database::<Note>::open("notes", Some(dir.path()))
            .await
            .expect("open");
        assert!(db.fetch_all().await.expect("all").is_empty());
    }

    #[tokio::test]
    async fn corrupted_records_are_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.json");
        std::fs::write(
            &path,
            r#"{"version":1,"records":[{"id":1,"text":"ok"},{"id":"broken"}]}"#,
        )
        .expect("seed");

        let db = Database::<Note>::open("notes", Some(dir.path()))
            .await
            .expect("open");
        assert_eq!(db.fetch_all().await.expect("all"), vec![note(1, "ok")]);
    }

    #[tokio::test]
    async fn unreadable_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("notes.json"), "not json").expect("seed");

        let db = Database::<Note>::open("notes", Some(dir.path()))
            .await
            .expect("open");
        assert!(db.fetch_all().await.expect("all").is_empty());
        db.insert(note(5, "fresh")).await.expect("insert");
        assert_eq!(db.fetch_all().await.expect("all").len(), 1);
    }
}
