//! The copy pipeline: wires the stages, drives the sink and reconciles the
//! result.

use std::error::Error as StdError;
use std::io::{self, Read, Write};
use std::sync::Arc;

use blobpipe_verify::DigestingReader;
use indicatif::ProgressBar;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::core::{is_encrypted_media_type, PendingEdits};
use crate::data::{BlobInfo, CopyOptions, ProgressProperties};
use crate::effects::cache::{BlobInfoCache, MemoryBlobInfoCache};
use crate::effects::compression::{compression_step, detect_compression_step, Decompressor};
use crate::effects::crypto::{decryption_step, encryption_step, Decrypter, Encrypter};
use crate::effects::progress::{meter, ProgressSession};
use crate::effects::readers::{ErrorAnnotationReader, SharedReader, SourceStream, TeeReader};
use crate::effects::sink::{BlobSink, PutBlobOptions};
use crate::error::{digest_label, CopyError, Result, SourceReadError};

/// Builds the writer receiving a copy of the decrypted, not yet
/// recompressed bytes. Given the decompressor for the detected format, or
/// `None` when the blob is not compressed.
pub type OriginalLayerWriter = Box<dyn FnOnce(Option<Decompressor>) -> Box<dyn Write + Send> + Send>;

/// Per-blob policy for [`Copier::copy_blob_from_stream`].
#[derive(Default)]
pub struct BlobCopyRequest {
    /// The stored blob may differ bit-for-bit from the source.
    pub can_modify_blob: bool,
    pub is_config: bool,
    pub to_encrypt: bool,
    pub layer_index: Option<usize>,
    pub empty_layer: bool,
    /// Visual meter counting raw source bytes.
    pub progress_bar: Option<ProgressBar>,
    pub original_layer_writer: Option<OriginalLayerWriter>,
}

impl BlobCopyRequest {
    /// A layer that may be recompressed.
    pub fn layer(index: usize) -> Self {
        Self {
            can_modify_blob: true,
            layer_index: Some(index),
            ..Self::default()
        }
    }

    /// A config blob; stored exactly as read.
    pub fn config() -> Self {
        Self {
            is_config: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn encrypt(mut self) -> Self {
        self.to_encrypt = true;
        self
    }

    #[must_use]
    pub fn progress_bar(mut self, bar: ProgressBar) -> Self {
        self.progress_bar = Some(bar);
        self
    }

    #[must_use]
    pub fn original_layer_writer(
        mut self,
        factory: impl FnOnce(Option<Decompressor>) -> Box<dyn Write + Send> + Send + 'static,
    ) -> Self {
        self.original_layer_writer = Some(Box::new(factory));
        self
    }
}

/// Copies blobs into one destination.
pub struct Copier<D> {
    dest:      D,
    cache:     Arc<dyn BlobInfoCache>,
    options:   CopyOptions,
    progress:  Option<UnboundedSender<ProgressProperties>>,
    decrypter: Option<Arc<dyn Decrypter>>,
    encrypter: Option<Arc<dyn Encrypter>>,
}

impl<D: BlobSink> Copier<D> {
    pub fn new(dest: D) -> Self {
        Self {
            dest,
            cache: Arc::new(MemoryBlobInfoCache::new()),
            options: CopyOptions::default(),
            progress: None,
            decrypter: None,
            encrypter: None,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn BlobInfoCache>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: CopyOptions) -> Self {
        self.options = options;
        self
    }

    /// Send progress notifications on `sender`; see
    /// [`CopyOptions::progress_interval`].
    #[must_use]
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressProperties>) -> Self {
        self.progress = Some(sender);
        self
    }

    #[must_use]
    pub fn with_decrypter(mut self, decrypter: Arc<dyn Decrypter>) -> Self {
        self.decrypter = Some(decrypter);
        self
    }

    #[must_use]
    pub fn with_encrypter(mut self, encrypter: Arc<dyn Encrypter>) -> Self {
        self.encrypter = Some(encrypter);
        self
    }

    pub fn dest(&self) -> &D { &self.dest }

    pub fn options(&self) -> &CopyOptions { &self.options }

    /// Copy one blob from `src`, described by `src_info`, to the destination
    /// and return what was stored.
    ///
    /// The source is read once. Its digest is verified on the way; the blob
    /// may be decrypted, recompressed and encrypted depending on `request`
    /// and the destination. The returned info records each change made.
    pub fn copy_blob_from_stream(
        &self,
        src: impl Read + Send + 'static,
        src_info: &BlobInfo,
        request: BlobCopyRequest,
    ) -> Result<BlobInfo> {
        let BlobCopyRequest {
            can_modify_blob,
            is_config,
            to_encrypt,
            layer_index,
            empty_layer,
            progress_bar,
            original_layer_writer,
        } = request;
        let digest = digest_label(src_info.digest.as_ref());

        // Dropped last, so `Done` follows everything else.
        let progress = self
            .progress
            .clone()
            .filter(|_| !self.options.progress_interval.is_zero())
            .map(|sender| ProgressSession::start(sender, src_info.clone()));

        let source_encrypted = is_encrypted_media_type(&src_info.media_type);
        if source_encrypted && self.decrypter.is_some() && to_encrypt {
            return Err(CopyError::ConflictingCrypto);
        }

        let verifier = DigestingReader::new(src, src_info.digest.clone()).map_err(|source| {
            CopyError::InvalidDigest {
                digest: digest.clone(),
                source,
            }
        })?;
        let validation = verifier.validation();
        let mut stream = SourceStream::new(Box::new(verifier), src_info.clone());

        if let Some(bar) = &progress_bar {
            meter(&mut stream, bar);
        }

        let decryption = decryption_step(&mut stream, self.decrypter.as_deref())?;
        let detected = detect_compression_step(&mut stream)?;

        let mut tee_point = None;
        if let Some(factory) = original_layer_writer {
            let writer = factory(detected.decompressor);
            stream.wrap(|r| {
                let shared = SharedReader::new(Box::new(TeeReader::new(r, writer)));
                tee_point = Some(shared.clone());
                Box::new(shared)
            });
        }

        // Keyed on the media type, which still says `+encrypted` after decryption.
        let can_modify_compression = can_modify_blob && !is_config && !source_encrypted;
        let compression = compression_step(
            &mut stream,
            can_modify_compression,
            &detected,
            self.dest.desired_layer_compression(),
            &self.options,
        )?;

        let encryption = encryption_step(&mut stream, to_encrypt, self.encrypter.as_deref(), decryption.decrypted)?;
        let crypto_changed = decryption.decrypted || encryption.is_encrypting();

        if let Some(session) = &progress {
            let interval = self.options.progress_interval;
            stream.wrap(|r| Box::new(session.reader(r, interval)));
        }
        stream.wrap(|r| Box::new(ErrorAnnotationReader::new(r)));

        let SourceStream {
            mut reader,
            info: stream_info,
        } = stream;
        let options = PutBlobOptions {
            cache: Arc::clone(&self.cache),
            is_config,
            layer_index: layer_index.filter(|_| !is_config),
            empty_layer,
        };
        let put = self.dest.put_blob(&mut reader, &stream_info, options);
        drop(reader);

        let drained = tee_point
            .map(|mut tee| io::copy(&mut tee, &mut io::sink()))
            .transpose();

        let uploaded = match put {
            Ok(uploaded) => uploaded,
            Err(err) => {
                if let Err(drain_err) = &drained {
                    warn!(%digest, error = %drain_err, "draining original layer copy after failed write");
                }
                return Err(sink_error(err, digest));
            }
        };
        if let Err(source) = drained {
            return Err(CopyError::Drain { digest, source });
        }

        // Before the edits, so a failing finalizer cannot hide a bad source.
        if validation.failed() {
            return Err(CopyError::DigestVerificationIgnored { digest });
        }

        let mut info = BlobInfo {
            digest: Some(uploaded.digest.clone()),
            size: uploaded.size,
            annotations: uploaded.annotations,
            media_type: stream_info.media_type.clone(),
            ..BlobInfo::default()
        };
        info.annotations.extend(stream_info.annotations.clone());
        PendingEdits {
            compression: compression.edit(),
            decryption,
            encryption,
        }
        .apply(&mut info)?;

        if let Some(expected) = &stream_info.digest {
            if *expected != uploaded.digest {
                return Err(CopyError::DigestIdentityViolated {
                    digest,
                    expected: expected.clone(),
                    actual: uploaded.digest,
                });
            }
        }

        if validation.succeeded() {
            compression.record_validated_digest_data(
                self.cache.as_ref(),
                &uploaded.digest,
                src_info.digest.as_ref(),
                crypto_changed,
            );
        }

        if src_info.digest.is_none() {
            if let Some(computed) = validation.computed_digest() {
                debug!(%computed, "source had no declared digest");
            }
        }
        debug!(
            %digest,
            uploaded = %uploaded.digest,
            compression = %info.compression_operation,
            "copied blob"
        );
        Ok(info)
    }
}

/// Attribute a sink failure to the source when the sink was only passing on
/// a read error.
fn sink_error<E: StdError + Send + Sync + 'static>(err: E, digest: String) -> CopyError {
    if SourceReadError::find(&err).is_some() {
        CopyError::ReadInput {
            digest,
            source: Box::new(err),
        }
    } else {
        CopyError::Write { source: Box::new(err) }
    }
}
