//! HTTP CONNECT Protocol Constants

// Request line
pub const CONNECT_METHOD: &str = "CONNECT";
pub const HTTP_VERSION: &str = "HTTP/1.1";
pub const CRLF: &str = "\r\n";

// Status code the proxy must answer with for the tunnel to open
pub const STATUS_TUNNEL_ESTABLISHED: &str = "200";

// Status line tokens: version, code, reason
pub const STATUS_LINE_MIN_TOKENS: usize = 3;

// Buffer sizes
pub const DEFAULT_HANDSHAKE_BUFFER_SIZE: usize = 256;
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 4096;
