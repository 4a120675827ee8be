use std::time::Duration;

/// Starts a temp upload session for the main video.
pub const INIT_UPLOAD_PATH: &str = "/video-temp/temp-upload/main-video";

/// Issues a presigned PUT URL for one part of a session.
pub const PART_PRESIGN_PATH: &str = "/video-temp/temp-upload/main-video/part-presign";

/// Assembles the uploaded parts into the final object.
pub const COMPLETE_UPLOAD_PATH: &str = "/video-temp/temp-upload/main-video/complete";

/// Prefix for playback URL lookups; the storage key is appended.
pub const PLAYBACK_URL_PATH: &str = "/video-temp/playback-url";

/// Default number of PUT attempts per part.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Timeout for backend API calls (session init, presign, complete).
///
/// These carry no payload, so the standard short timeout applies.
pub const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Lower bound for the storage PUT timeout.
///
/// A 50 MiB part over a slow uplink can take several minutes.
pub const MIN_STORAGE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Response header carrying the part integrity token. Header names are
/// matched case-insensitively, so `ETag` is found too.
pub const ETAG_HEADER: &str = "etag";

/// Maximum number of response body characters kept for diagnostics.
pub const ERROR_BODY_LIMIT: usize = 256;
