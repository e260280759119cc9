//! Persistence sink for product and variant records
//!
//! One dedicated writer thread owns both CSV files. Callers send records over
//! an mpsc queue together with a oneshot acknowledgement; the writer
//! serializes the row, flushes and `sync_data`s the file, and only then
//! acknowledges. An awaited `append_*` call therefore means the row is on
//! disk, and appends from concurrent workers can never interleave.
//!
//! Each record is written at most once per session: products are keyed by
//! `product_url`, variants by `(variant_product_url, variant_type,
//! variant_option)`.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::domain::{ProductRecord, Session, VariantRecord};

pub const PRODUCT_HEADERS: [&str; 7] = [
    "product_url",
    "title",
    "price",
    "seller_name",
    "manufacturer_name",
    "image_url",
    "is_whitelisted",
];

pub const VARIANT_HEADERS: [&str; 11] = [
    "variant_product_url",
    "main_product_url",
    "title",
    "variant_price",
    "seller_name",
    "manufacturer_name",
    "image_url",
    "is_whitelisted",
    "variant_type",
    "variant_option",
    "variant_identifier",
];

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode row for {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("record writer has stopped")]
    WriterStopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Written,
    /// Same fingerprint already written in this session
    Skipped,
}

/// Byte destination behind one CSV stream
pub trait RowDestination: Write + Send + 'static {
    /// Make everything flushed so far durable.
    fn sync(&self) -> io::Result<()>;
}

impl RowDestination for File {
    fn sync(&self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Create `path` (and its parent directories) for writing.
pub fn create_file(path: &Path) -> Result<File, SinkError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SinkError::Io {
            action: "create directory",
            path: parent.to_path_buf(),
            source,
        })?;
    }
    File::create(path).map_err(|source| SinkError::Io {
        action: "create",
        path: path.to_path_buf(),
        source,
    })
}

type Ack<T> = oneshot::Sender<Result<T, SinkError>>;

enum Command {
    Product(Box<ProductRecord>, Ack<AppendOutcome>),
    Variant(Box<VariantRecord>, Ack<AppendOutcome>),
    Close(Ack<()>),
}

/// Cloneable handle to the session's writer thread
#[derive(Debug, Clone)]
pub struct RecordSink {
    tx: mpsc::Sender<Command>,
    products_path: Arc<PathBuf>,
    variants_path: Arc<PathBuf>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Product(record, _) => write!(f, "Product({})", record.product_url),
            Self::Variant(record, _) => write!(f, "Variant({})", record.variant_product_url),
            Self::Close(_) => f.write_str("Close"),
        }
    }
}

impl RecordSink {
    /// Create both session files with their header rows and start the writer.
    pub fn open(session: &Session) -> Result<Self, SinkError> {
        Self::open_paths(&session.products_path, &session.variants_path)
    }

    pub fn open_paths(products_path: &Path, variants_path: &Path) -> Result<Self, SinkError> {
        let products = create_file(products_path)?;
        let variants = create_file(variants_path)?;
        Self::with_destinations(products_path, Box::new(products), variants_path, Box::new(variants))
    }

    /// Start the writer over caller-supplied destinations; `*_path` name
    /// them in errors and in the session report.
    pub fn with_destinations(
        products_path: &Path,
        products: Box<dyn RowDestination>,
        variants_path: &Path,
        variants: Box<dyn RowDestination>,
    ) -> Result<Self, SinkError> {
        let products = CsvStream::new(products_path, products, &PRODUCT_HEADERS)?;
        let variants = CsvStream::new(variants_path, variants, &VARIANT_HEADERS)?;
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);

        thread::Builder::new()
            .name("record-writer".to_string())
            .spawn(move || writer_loop(products, variants, rx))
            .map_err(|source| SinkError::Io {
                action: "start writer for",
                path: products_path.to_path_buf(),
                source,
            })?;

        debug!(products = %products_path.display(), variants = %variants_path.display(), "Record sink opened");
        Ok(Self {
            tx,
            products_path: Arc::new(products_path.to_path_buf()),
            variants_path: Arc::new(variants_path.to_path_buf()),
        })
    }

    #[must_use]
    pub fn products_path(&self) -> &Path {
        &self.products_path
    }

    #[must_use]
    pub fn variants_path(&self) -> &Path {
        &self.variants_path
    }

    /// Returns once the row is durable (or was already written).
    pub async fn append_product(&self, record: ProductRecord) -> Result<AppendOutcome, SinkError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Product(Box::new(record), ack)).await?;
        done.await.map_err(|_| SinkError::WriterStopped)?
    }

    pub async fn append_variant(&self, record: VariantRecord) -> Result<AppendOutcome, SinkError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Variant(Box::new(record), ack)).await?;
        done.await.map_err(|_| SinkError::WriterStopped)?
    }

    /// Drain queued rows, flush both files and stop the writer.
    pub async fn close(&self) -> Result<(), SinkError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Close(ack)).await?;
        done.await.map_err(|_| SinkError::WriterStopped)?
    }

    async fn send(&self, command: Command) -> Result<(), SinkError> {
        self.tx.send(command).await.map_err(|_| SinkError::WriterStopped)
    }
}

struct CsvStream {
    path: PathBuf,
    writer: csv::Writer<Box<dyn RowDestination>>,
}

impl CsvStream {
    fn new(path: &Path, destination: Box<dyn RowDestination>, headers: &[&str]) -> Result<Self, SinkError> {
        let mut stream = Self {
            path: path.to_path_buf(),
            writer: csv::WriterBuilder::new().has_headers(false).from_writer(destination),
        };
        stream
            .writer
            .write_record(headers)
            .map_err(|source| stream.csv_error(source))?;
        stream.flush_durable()?;
        Ok(stream)
    }

    fn append<T: Serialize>(&mut self, record: &T) -> Result<(), SinkError> {
        self.writer
            .serialize(record)
            .map_err(|source| self.csv_error(source))?;
        self.flush_durable()
    }

    fn flush_durable(&mut self) -> Result<(), SinkError> {
        self.writer.flush().map_err(|source| self.io_error("flush", source))?;
        self.writer
            .get_ref()
            .sync()
            .map_err(|source| self.io_error("sync", source))
    }

    fn csv_error(&self, source: csv::Error) -> SinkError {
        SinkError::Csv {
            path: self.path.clone(),
            source,
        }
    }

    fn io_error(&self, action: &'static str, source: std::io::Error) -> SinkError {
        SinkError::Io {
            action,
            path: self.path.clone(),
            source,
        }
    }
}

fn writer_loop(mut products: CsvStream, mut variants: CsvStream, mut rx: mpsc::Receiver<Command>) {
    let mut written_products: HashSet<String> = HashSet::new();
    let mut written_variants: HashSet<(String, String, String)> = HashSet::new();

    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Product(record, ack) => {
                let outcome = if written_products.contains(&record.product_url) {
                    Ok(AppendOutcome::Skipped)
                } else {
                    products.append(&*record).map(|()| {
                        written_products.insert(record.product_url.clone());
                        AppendOutcome::Written
                    })
                };
                if let Err(e) = &outcome {
                    error!(error = %e, "Product row not persisted");
                }
                let _ = ack.send(outcome);
            }
            Command::Variant(record, ack) => {
                let fingerprint = record.fingerprint();
                let outcome = if written_variants.contains(&fingerprint) {
                    Ok(AppendOutcome::Skipped)
                } else {
                    variants.append(&*record).map(|()| {
                        written_variants.insert(fingerprint);
                        AppendOutcome::Written
                    })
                };
                if let Err(e) = &outcome {
                    error!(error = %e, "Variant row not persisted");
                }
                let _ = ack.send(outcome);
            }
            Command::Close(ack) => {
                let result = products.flush_durable().and_then(|()| variants.flush_durable());
                let _ = ack.send(result);
                break;
            }
        }
    }
    debug!("Record writer stopped");
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SinkError> {
    let csv_error = |source| SinkError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    reader.deserialize().collect::<Result<Vec<T>, _>>().map_err(csv_error)
}

/// Re-read a products file written by [`RecordSink`].
pub fn read_products(path: &Path) -> Result<Vec<ProductRecord>, SinkError> {
    read_rows(path)
}

pub fn read_variants(path: &Path) -> Result<Vec<VariantRecord>, SinkError> {
    read_rows(path)
}
