mod load;
mod types;

pub use load::{get_redline_data_dir, load_default};
pub use types::{
    AppConfig, BackendConfig, DispatchConfig, LoggingConfig, ModelConfig, ModelsConfig,
    ThrottleConfig,
};
