use super::{Config, Secret};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_embedding();
        self.apply_env_overrides_store();
        self.apply_env_overrides_ingest();
        self.apply_env_secrets();
    }

    fn apply_env_overrides_embedding(&mut self) {
        if let Ok(v) = std::env::var("FORKLIFT_EMBEDDING_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.embedding.provider = kind;
            } else {
                tracing::warn!("ignoring invalid FORKLIFT_EMBEDDING_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("FORKLIFT_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("FORKLIFT_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("FORKLIFT_EMBEDDING_DIMENSION") {
            if let Ok(n) = v.parse::<usize>() {
                self.embedding.dimension = n;
            } else {
                tracing::warn!("ignoring invalid FORKLIFT_EMBEDDING_DIMENSION value: {v}");
            }
        }
        if let Ok(v) = std::env::var("FORKLIFT_EMBEDDING_BATCH_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                self.embedding.batch_size = n;
            } else {
                tracing::warn!("ignoring invalid FORKLIFT_EMBEDDING_BATCH_SIZE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("FORKLIFT_EMBEDDING_TIMEOUT")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.embedding.timeout_secs = secs;
        }
    }

    fn apply_env_overrides_store(&mut self) {
        if let Ok(v) = std::env::var("FORKLIFT_STORE_BACKEND") {
            if let Ok(backend) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.store.backend = backend;
            } else {
                tracing::warn!("ignoring invalid FORKLIFT_STORE_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("FORKLIFT_STORE_PATH") {
            self.store.path = v.into();
        }
        if let Ok(v) = std::env::var("FORKLIFT_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("FORKLIFT_QDRANT_COLLECTION") {
            self.store.collection = v;
        }
    }

    fn apply_env_overrides_ingest(&mut self) {
        if let Ok(v) = std::env::var("FORKLIFT_CHUNK_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunker.generic_chunk_size = n;
        }
        if let Ok(v) = std::env::var("FORKLIFT_INGEST_EXTENSIONS") {
            let extensions: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if extensions.is_empty() {
                tracing::warn!("ignoring empty FORKLIFT_INGEST_EXTENSIONS");
            } else {
                self.ingest.extensions = extensions;
            }
        }
        if let Ok(v) = std::env::var("FORKLIFT_INGEST_MAX_FILE_SIZE") {
            if let Ok(n) = v.parse::<u64>() {
                self.ingest.max_file_size = n;
            } else {
                tracing::warn!("ignoring invalid FORKLIFT_INGEST_MAX_FILE_SIZE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("FORKLIFT_FETCH_TIMEOUT")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.ingest.fetch_timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("FORKLIFT_DEFAULT_BRANCH")
            && !v.trim().is_empty()
        {
            self.ingest.default_branch = v.trim().to_owned();
        }
    }

    fn apply_env_secrets(&mut self) {
        if let Ok(v) = std::env::var("FORKLIFT_OPENAI_API_KEY")
            && !v.is_empty()
        {
            self.secrets.openai_api_key = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var("FORKLIFT_HF_API_KEY")
            && !v.is_empty()
        {
            self.secrets.huggingface_api_key = Some(Secret::new(v));
        }
    }
}
