//! On-disk cache of road graphs keyed by geographic segment.
//!
//! A leg between two coordinates maps to a segment: the midpoint of the two
//! points and a search radius of `max(2000 m, 0.8 * distance)`. The segment is
//! quantized into a [`CacheKey`] (midpoint to 0.001 degrees, radius down to a
//! multiple of 100 m) and the fetched graph is stored in one file per key, so
//! nearby legs and later runs reuse the same artifact.
//!
//! # File format
//!
//! ```text
//! Header (16 bytes):
//!   - Magic: b"TRGC" (4 bytes)
//!   - Version: u8 (1 byte)
//!   - Flags: u8 (1 byte), reserved
//!   - Node count: u32 LE (4 bytes)
//!   - Edge count: u32 LE (4 bytes)
//!   - Reserved: 2 bytes
//!
//! Body:
//!   - postcard-serialized RoadGraph
//!   - zstd compressed
//!
//! Footer (32 bytes):
//!   - SHA-256 checksum of compressed body
//! ```
//!
//! Files are written to a temporary file in the cache directory and renamed
//! into place, so a concurrent reader sees either no file or a complete one.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::geo::{haversine_distance, midpoint, Coordinate};
use crate::graph::RoadGraph;
use crate::provider::RoadNetworkProvider;

/// Smallest radius fetched around a segment midpoint.
pub const MIN_SEGMENT_RADIUS_METERS: f64 = 2_000.0;

/// Radius as a fraction of the straight-line leg distance.
pub const SEGMENT_RADIUS_FACTOR: f64 = 0.8;

/// Radius quantization step.
const RADIUS_STEP_METERS: f64 = 100.0;

const FILE_PREFIX: &str = "graph_";
const FILE_EXTENSION: &str = "bin";

const CACHE_MAGIC: &[u8; 4] = b"TRGC";
const CACHE_VERSION: u8 = 1;
const HEADER_SIZE: usize = 16;
const CHECKSUM_SIZE: usize = 32;

/// zstd compression level (balanced speed/ratio).
const COMPRESSION_LEVEL: i32 = 3;

/// Midpoint and fetch radius for the leg `origin -> destination`.
pub fn segment_bounds(origin: Coordinate, destination: Coordinate) -> (Coordinate, f64) {
    let center = midpoint(origin, destination);
    let radius = (haversine_distance(origin, destination) * SEGMENT_RADIUS_FACTOR)
        .max(MIN_SEGMENT_RADIUS_METERS);
    (center, radius)
}

/// Quantized segment identifier.
///
/// The midpoint is stored in integer thousandths of a degree so keys compare
/// and hash exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    lat_millideg: i64,
    lng_millideg: i64,
    radius_meters: u32,
}

impl CacheKey {
    /// Key of the segment covering the leg `origin -> destination`.
    pub fn for_segment(origin: Coordinate, destination: Coordinate) -> Self {
        let (center, radius) = segment_bounds(origin, destination);
        Self::quantize(center, radius)
    }

    /// Round `center` to 0.001 degrees and `radius_meters` down to 100 m.
    ///
    /// Degrees are rounded from their exact binary value with ties to even,
    /// the same digits a `%.3f` formatter prints, so `21.0625` becomes
    /// `21.062` rather than `21.063`.
    pub fn quantize(center: Coordinate, radius_meters: f64) -> Self {
        let steps = (radius_meters / RADIUS_STEP_METERS).floor().max(0.0);
        Self {
            lat_millideg: to_millidegrees(center.lat),
            lng_millideg: to_millidegrees(center.lng),
            radius_meters: (steps * RADIUS_STEP_METERS) as u32,
        }
    }

    /// Quantized midpoint.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            self.lat_millideg as f64 / 1000.0,
            self.lng_millideg as f64 / 1000.0,
        )
    }

    pub fn radius_meters(&self) -> u32 {
        self.radius_meters
    }

    /// Deterministic file name, e.g. `graph_21.037_105.871_2000.bin`.
    pub fn file_name(&self) -> String {
        format!(
            "{FILE_PREFIX}{}_{}_{}.{FILE_EXTENSION}",
            format_millidegrees(self.lat_millideg),
            format_millidegrees(self.lng_millideg),
            self.radius_meters
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{} r={}m",
            format_millidegrees(self.lat_millideg),
            format_millidegrees(self.lng_millideg),
            self.radius_meters
        )
    }
}

fn to_millidegrees(degrees: f64) -> i64 {
    format!("{degrees:.3}")
        .replace('.', "")
        .parse()
        .unwrap_or_else(|_| (degrees * 1000.0).round() as i64)
}

fn format_millidegrees(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    format!("{sign}{}.{:03}", magnitude / 1000, magnitude % 1000)
}

/// Graph returned by [`GraphCache::get_or_fetch`].
#[derive(Debug, Clone)]
pub struct CachedGraph {
    pub key: CacheKey,
    pub graph: RoadGraph,
    /// `true` when the graph was read from disk without calling the provider.
    pub cache_hit: bool,
}

/// A persisted graph file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Segment-keyed road graph store.
///
/// Safe to share between threads. Concurrent misses on the same key are
/// serialized so only one of them calls the provider.
#[derive(Debug)]
pub struct GraphCache {
    dir: PathBuf,
    locks: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl GraphCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Return the graph for the leg `origin -> destination`, fetching and
    /// persisting it on a miss.
    ///
    /// Provider failures propagate as [`Error::ProviderFetch`] without retry.
    /// A cache file that cannot be decoded is logged and refetched.
    pub fn get_or_fetch<P>(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        provider: &P,
    ) -> Result<CachedGraph>
    where
        P: RoadNetworkProvider + ?Sized,
    {
        let (center, radius) = segment_bounds(origin, destination);
        let key = CacheKey::quantize(center, radius);
        let path = self.path_for(&key);

        if let Some(graph) = self.try_load(&path) {
            return Ok(hit(key, graph));
        }

        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another thread may have filled the entry while we waited.
        if let Some(graph) = self.try_load(&path) {
            return Ok(hit(key, graph));
        }

        info!(%key, path = %path.display(), "fetching road graph");
        let graph = provider
            .fetch_graph(center, radius)
            .map_err(|error| match error {
                Error::ProviderFetch { .. } => error,
                other => Error::provider(other),
            })?;

        self.store(&key, &graph)?;

        Ok(CachedGraph {
            key,
            graph,
            cache_hit: false,
        })
    }

    /// Read the graph stored under `key`, if any.
    pub fn load(&self, key: &CacheKey) -> Result<Option<RoadGraph>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        read_graph_file(&path).map(Some)
    }

    /// Persist `graph` under `key`, creating the cache directory if needed.
    pub fn store(&self, key: &CacheKey, graph: &RoadGraph) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        write_graph_file(&path, graph)?;
        Ok(path)
    }

    /// Graph files currently in the cache directory, sorted by path.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !is_graph_file(&path) {
                continue;
            }
            let metadata = entry.metadata()?;
            if metadata.is_file() {
                entries.push(CacheEntry {
                    path,
                    size_bytes: metadata.len(),
                });
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Delete every graph file and return how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let entries = self.entries()?;
        for entry in &entries {
            fs::remove_file(&entry.path)?;
        }
        info!(dir = %self.dir.display(), removed = entries.len(), "cleared graph cache");
        Ok(entries.len())
    }

    fn try_load(&self, path: &Path) -> Option<RoadGraph> {
        if !path.exists() {
            return None;
        }

        match read_graph_file(path) {
            Ok(graph) => {
                info!(
                    path = %path.display(),
                    nodes = graph.node_count(),
                    edges = graph.edge_count(),
                    "loaded road graph from cache"
                );
                Some(graph)
            }
            Err(error) => {
                warn!(
                    path = %path.display(),
                    %error,
                    "failed to load cached road graph, will refetch"
                );
                None
            }
        }
    }

    fn key_lock(&self, key: CacheKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key).or_default())
    }
}

fn hit(key: CacheKey, graph: RoadGraph) -> CachedGraph {
    CachedGraph {
        key,
        graph,
        cache_hit: true,
    }
}

fn is_graph_file(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(FILE_PREFIX))
        .unwrap_or(false);
    let extension_matches = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == FILE_EXTENSION)
        .unwrap_or(false);
    name_matches && extension_matches
}

fn encode_graph(graph: &RoadGraph) -> Result<Vec<u8>> {
    let serialized = postcard::to_allocvec(graph).map_err(|e| Error::GraphCacheSerialize {
        message: format!("postcard serialization failed: {}", e),
    })?;

    let compressed = zstd::encode_all(serialized.as_slice(), COMPRESSION_LEVEL).map_err(|e| {
        Error::GraphCacheSerialize {
            message: format!("zstd compression failed: {}", e),
        }
    })?;

    let checksum = Sha256::digest(&compressed);

    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(CACHE_MAGIC);
    header[4] = CACHE_VERSION;
    header[6..10].copy_from_slice(&(graph.node_count() as u32).to_le_bytes());
    header[10..14].copy_from_slice(&(graph.edge_count() as u32).to_le_bytes());

    let mut bytes = Vec::with_capacity(HEADER_SIZE + compressed.len() + CHECKSUM_SIZE);
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&compressed);
    bytes.extend_from_slice(&checksum);
    Ok(bytes)
}

fn decode_graph(bytes: &[u8], path: &Path) -> Result<RoadGraph> {
    let fail = |message: String| Error::GraphCacheLoad {
        path: path.to_path_buf(),
        message,
    };

    if bytes.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(fail(format!("file too short ({} bytes)", bytes.len())));
    }

    let (header, rest) = bytes.split_at(HEADER_SIZE);
    if &header[0..4] != CACHE_MAGIC {
        return Err(fail("invalid magic bytes".to_string()));
    }

    let version = header[4];
    if version != CACHE_VERSION {
        return Err(fail(format!(
            "unsupported version {} (expected {})",
            version, CACHE_VERSION
        )));
    }

    let node_count = read_u32(&header[6..10]);
    let edge_count = read_u32(&header[10..14]);

    let (compressed, stored_checksum) = rest.split_at(rest.len() - CHECKSUM_SIZE);
    let computed_checksum = Sha256::digest(compressed);
    if computed_checksum.as_slice() != stored_checksum {
        return Err(fail("checksum mismatch - file may be corrupted".to_string()));
    }

    let decompressed = zstd::decode_all(compressed)
        .map_err(|e| fail(format!("zstd decompression failed: {}", e)))?;

    let graph: RoadGraph = postcard::from_bytes(&decompressed)
        .map_err(|e| fail(format!("postcard deserialization failed: {}", e)))?;

    if graph.node_count() != node_count as usize || graph.edge_count() != edge_count as usize {
        return Err(fail(format!(
            "header declares {} nodes/{} edges, body has {}/{}",
            node_count,
            edge_count,
            graph.node_count(),
            graph.edge_count()
        )));
    }

    Ok(graph)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn write_graph_file(path: &Path, graph: &RoadGraph) -> Result<()> {
    let bytes = encode_graph(graph)?;
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|err| err.error)?;

    debug!(
        path = %path.display(),
        size = bytes.len(),
        nodes = graph.node_count(),
        "road graph persisted"
    );
    Ok(())
}

fn read_graph_file(path: &Path) -> Result<RoadGraph> {
    let bytes = fs::read(path).map_err(|e| Error::GraphCacheLoad {
        path: path.to_path_buf(),
        message: format!("failed to read file: {}", e),
    })?;
    decode_graph(&bytes, path)
}
