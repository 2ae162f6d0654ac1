//! Off-screen image preloading.
//!
//! A preload fetches the image bytes and then attempts to decode them before the
//! result is handed to the board. Decoding is an optimization: when it is unavailable
//! or fails, the undecoded element is still returned. Only a failed fetch fails the
//! preload, and nothing is retried. A fetch that outlives the preloader's timeout
//! fails too, so one stalled response cannot hold a whole batch.

use core::fmt::{Display, Formatter, Result as FmtResult};
use core::future::Future;
use core::pin::Pin;
use core::time::Duration;
use std::error::Error;
use std::sync::Arc;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use log::debug;
use reqwest::Client;

use crate::source::ImageRequest;

/// Reason a fetch did not produce image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    /// The request could not be sent or the connection failed.
    Network(String),
    /// The server answered with a non-success status.
    Status(u16),
    /// The response body could not be read.
    Body(String),
    /// No complete response arrived within the fetch timeout.
    Timeout(Duration),
}

impl Display for LoadFailure {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Network(message) => write!(formatter, "network error: {message}"),
            Self::Status(code) => write!(formatter, "status {code}"),
            Self::Body(message) => write!(formatter, "body read error: {message}"),
            Self::Timeout(limit) => write!(formatter, "timed out after {} ms", limit.as_millis()),
        }
    }
}

/// A single image failed to load. Carries the request it belongs to.
#[derive(Debug, Clone)]
pub struct LoadError {
    pub request: ImageRequest,
    pub reason: LoadFailure,
}

impl Display for LoadError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(
            formatter,
            "failed to load {} ({}x{}): {}",
            self.request.url, self.request.target_width_px, self.request.target_height_px, self.reason
        )
    }
}

impl Error for LoadError {}

/// Bytes were fetched but could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload is not an image the decoder understands.
    Invalid(String),
    /// The decode task was aborted before finishing.
    Interrupted(String),
}

impl Display for DecodeError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Invalid(message) => write!(formatter, "invalid image data: {message}"),
            Self::Interrupted(message) => write!(formatter, "decode interrupted: {message}"),
        }
    }
}

impl Error for DecodeError {}

/// Type alias for the pinned future returned by image fetchers.
pub type FetchFuture<'fetch> =
    Pin<Box<dyn Future<Output = Result<Bytes, LoadFailure>> + Send + 'fetch>>;

/// Transport that retrieves the raw bytes behind a request URL.
pub trait ImageFetcher: Send + Sync {
    fn fetch<'fetch>(&'fetch self, url: &'fetch str) -> FetchFuture<'fetch>;
}

/// HTTP GET fetcher backed by a shared `reqwest` client.
#[derive(Clone, Debug, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// A fetcher whose client abandons any request running longer than `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `LoadFailure::Network` if the HTTP client cannot be built.
    pub fn with_timeout(timeout: Duration) -> Result<Self, LoadFailure> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LoadFailure::Network(err.to_string()))?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch<'fetch>(&'fetch self, url: &'fetch str) -> FetchFuture<'fetch> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|err| LoadFailure::Network(err.to_string()))?;
            if !response.status().is_success() {
                return Err(LoadFailure::Status(response.status().as_u16()));
            }
            response
                .bytes()
                .await
                .map_err(|err| LoadFailure::Body(err.to_string()))
        })
    }
}

/// A fetched image, decoded when possible.
#[derive(Clone, Debug)]
pub struct ImageElement {
    bytes: Bytes,
    format: Option<ImageFormat>,
    decoded: Option<Arc<DynamicImage>>,
}

impl ImageElement {
    /// An element that skipped or failed decoding.
    pub fn undecoded(bytes: Bytes) -> Self {
        let format = image::guess_format(&bytes).ok();
        Self {
            bytes,
            format,
            decoded: None,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Format sniffed from the payload, if recognizable.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn is_decoded(&self) -> bool {
        self.decoded.is_some()
    }

    pub fn decoded(&self) -> Option<&DynamicImage> {
        self.decoded.as_deref()
    }

    /// Pixel dimensions, known only after decoding.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.decoded
            .as_ref()
            .map(|pixels| (pixels.width(), pixels.height()))
    }
}

/// A request paired with its render-ready element.
#[derive(Clone, Debug)]
pub struct PreloadedImage {
    pub request: ImageRequest,
    pub element: ImageElement,
}

/// Decodes fetched bytes off the event loop.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageDecoder;

impl ImageDecoder {
    /// Decode `bytes` on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Invalid` for unreadable payloads and
    /// `DecodeError::Interrupted` if the decode task did not complete.
    pub async fn decode(&self, bytes: Bytes) -> Result<ImageElement, DecodeError> {
        tokio::task::spawn_blocking(move || {
            let format = image::guess_format(&bytes).ok();
            let pixels = image::load_from_memory(&bytes)
                .map_err(|err| DecodeError::Invalid(err.to_string()))?;
            Ok(ImageElement {
                bytes,
                format,
                decoded: Some(Arc::new(pixels)),
            })
        })
        .await
        .map_err(|err| DecodeError::Interrupted(err.to_string()))?
    }
}

/// Upper bound on a single fetch unless configured otherwise.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches and decodes one image per call, single attempt.
#[derive(Clone)]
pub struct ImagePreloader {
    fetcher: Arc<dyn ImageFetcher>,
    /// `None` when decoding is unavailable
    decoder: Option<ImageDecoder>,
    fetch_timeout: Duration,
}

impl ImagePreloader {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            fetcher,
            decoder: Some(ImageDecoder),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// A preloader that never decodes; elements resolve as soon as bytes arrive.
    pub fn without_decoding(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            fetcher,
            decoder: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Fail any fetch still pending after `timeout`. Zero is raised to 1 ms.
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Load one image until it is render-ready.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if the fetch fails or times out. Decode failures are not errors.
    pub async fn preload(&self, request: ImageRequest) -> Result<PreloadedImage, LoadError> {
        let fetched = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(&request.url))
            .await
            .unwrap_or(Err(LoadFailure::Timeout(self.fetch_timeout)));
        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(reason) => return Err(LoadError { request, reason }),
        };
        let element = match self.decoder {
            Some(decoder) => match decoder.decode(bytes.clone()).await {
                Ok(element) => element,
                Err(err) => {
                    debug!("Decode skipped for {}: {err}", request.url);
                    ImageElement::undecoded(bytes)
                }
            },
            None => ImageElement::undecoded(bytes),
        };
        Ok(PreloadedImage { request, element })
    }
}
