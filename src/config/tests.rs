use super::*;
use serial_test::serial;
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

const ALL_VARS: [&str; 14] = [
    "PORT",
    "BIND_ADDR",
    "MODEL_NAME",
    "MODEL_NAMES",
    "BATCH_SIZES",
    "DEVICE",
    "MAX_LENGTH",
    "RUNPOD_MAX_CONCURRENCY",
    "USE_FLASH_ATTENTION",
    "TORCH_DTYPE",
    "HF_HOME",
    "COPY_TO_VOLUME",
    "EMBEDDING_SERVICE_URL",
    "RERANKER_SERVICE_URL",
];

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for key in ALL_VARS {
        unsafe { env::remove_var(key) };
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.port, 8000);
    assert_eq!(config.bind_addr, IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)));
    assert_eq!(config.model_name, "Qwen/Qwen3-Reranker-0.6B");
    assert_eq!(config.model_names.len(), 2);
    assert_eq!(config.batch_sizes, vec![32, 32]);
    assert_eq!(config.max_length, 8192);
    assert_eq!(config.max_concurrency, 10);
    assert_eq!(config.precision, Precision::Float16);
    assert_eq!(config.device, DevicePreference::Auto);
    assert!(!config.use_flash_attention);
    assert!(!config.copy_to_volume);
    assert!(config.validate().is_ok());
}

#[test]
fn test_socket_addr() {
    let config = Config {
        port: 8002,
        bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        ..Default::default()
    };
    assert_eq!(config.socket_addr(), "127.0.0.1:8002");
}

#[test]
#[serial]
fn test_from_env_with_defaults() {
    clear_env();

    let config = Config::from_env().expect("should parse with defaults");

    assert_eq!(config.port, 8000);
    assert_eq!(config.max_length, 8192);
    assert!(config.hf_home.is_none());
}

#[test]
#[serial]
fn test_from_env_model_settings() {
    clear_env();

    with_env_vars(
        &[
            ("MODEL_NAME", "/models/Qwen3-Reranker-0.6B"),
            ("MAX_LENGTH", "4096"),
            ("RUNPOD_MAX_CONCURRENCY", "4"),
            ("DEVICE", "cpu"),
            ("TORCH_DTYPE", "bfloat16"),
            ("USE_FLASH_ATTENTION", "TRUE"),
            ("HF_HOME", "/runpod-volume"),
            ("COPY_TO_VOLUME", "true"),
        ],
        || {
            let config = Config::from_env().expect("should parse");
            assert_eq!(config.model_name, "/models/Qwen3-Reranker-0.6B");
            assert_eq!(config.max_length, 4096);
            assert_eq!(config.max_concurrency, 4);
            assert_eq!(config.device, DevicePreference::Cpu);
            assert_eq!(config.precision, Precision::BFloat16);
            assert!(config.use_flash_attention);
            assert_eq!(config.hf_home, Some(PathBuf::from("/runpod-volume")));
            assert!(config.copy_to_volume);
        },
    );
}

#[test]
#[serial]
fn test_from_env_model_names_list() {
    clear_env();

    with_env_vars(
        &[
            (
                "MODEL_NAMES",
                "/models/Qwen3-Embedding-0.6B; /models/Qwen3-Reranker-0.6B;",
            ),
            ("BATCH_SIZES", "16;8"),
        ],
        || {
            let config = Config::from_env().expect("should parse");
            assert_eq!(
                config.model_names,
                vec![
                    "/models/Qwen3-Embedding-0.6B".to_string(),
                    "/models/Qwen3-Reranker-0.6B".to_string()
                ]
            );
            assert_eq!(config.batch_sizes, vec![16, 8]);
            assert!(config.validate().is_ok());
        },
    );
}

#[test]
#[serial]
fn test_from_env_batch_sizes_default_to_model_count() {
    clear_env();

    with_env_vars(&[("MODEL_NAMES", "a;b;c")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.batch_sizes, vec![32, 32, 32]);
    });
}

#[test]
#[serial]
fn test_from_env_invalid_max_length() {
    clear_env();

    with_env_vars(&[("MAX_LENGTH", "lots")], || {
        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidNumber {
                name: "MAX_LENGTH",
                ..
            })
        ));
    });
}

#[test]
#[serial]
fn test_from_env_unknown_dtype() {
    clear_env();

    with_env_vars(&[("TORCH_DTYPE", "int4")], || {
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::UnknownDtype { .. })));
    });
}

#[test]
#[serial]
fn test_from_env_unknown_device() {
    clear_env();

    with_env_vars(&[("DEVICE", "tpu")], || {
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("tpu"));
    });
}

#[test]
#[serial]
fn test_from_env_zero_port() {
    clear_env();

    with_env_vars(&[("PORT", "0")], || {
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidPort { .. })
        ));
    });
}

#[test]
fn test_validate_zero_concurrency() {
    let config = Config {
        max_concurrency: 0,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MustBePositive {
            name: "RUNPOD_MAX_CONCURRENCY",
            ..
        })
    ));
}

#[test]
fn test_validate_batch_size_mismatch() {
    let config = Config {
        batch_sizes: vec![8],
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::BatchSizeMismatch {
            models: 2,
            batch_sizes: 1
        })
    ));
}

#[test]
fn test_precision_dtype_mapping() {
    assert_eq!(Precision::Float16.dtype(), DType::F16);
    assert_eq!(Precision::BFloat16.dtype(), DType::BF16);
    assert_eq!(Precision::Float32.dtype(), DType::F32);
    assert_eq!("fp32".parse::<Precision>().unwrap(), Precision::Float32);
}

#[test]
fn test_device_preference_parse() {
    assert_eq!("".parse::<DevicePreference>().unwrap(), DevicePreference::Auto);
    assert_eq!("CUDA".parse::<DevicePreference>().unwrap(), DevicePreference::Cuda);
    assert_eq!(DevicePreference::Metal.to_string(), "metal");
}
