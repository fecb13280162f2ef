/// Port the binary listens on. Embedders and tests override it via
/// [`Config::port`].
pub const DEFAULT_PORT: u16 = 12345;

/// Startup configuration. All values are fixed for the server's lifetime.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub max_clients: usize,
    pub database_shards: usize,
    pub user_shards: usize,
}

impl Config {
    pub fn new(max_clients: usize, database_shards: usize, user_shards: usize) -> Config {
        Config {
            port: DEFAULT_PORT,
            max_clients,
            database_shards,
            user_shards,
        }
    }

    pub fn port(mut self, port: u16) -> Config {
        self.port = port;
        self
    }
}
