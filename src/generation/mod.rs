use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

mod cache;
mod provider;

pub use cache::{CacheStore, RedisCache};
pub use provider::{
    CompletionChoice, CompletionProvider, CompletionResponse, HttpCompletionClient, ProviderError,
};

/// 滚动历史保留的最大条数
pub const HISTORY_LIMIT: usize = 10;

const CACHE_KEY_PREFIX: &str = "gen:msg:";

/// 请求体缺字段时按空字符串处理，统一走字段校验，
/// 避免反序列化错误把内部提示直接暴露给客户端
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateParams {
    #[serde(default)]
    pub recipient_name: String,
    #[serde(default)]
    pub special_moments: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedMessage {
    pub recipient_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub text: String,
    pub from_cache: bool,
    pub recipient_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum GenerateError {
    /// 参数校验失败：字段名 -> 错误提示
    Validation(HashMap<String, String>),
    /// 上游调用失败或响应不合法
    Upstream(String),
}

/// 缓存优先的生成器：命中缓存直接返回，未命中才调上游，
/// 成功结果写缓存并追加进程内滚动历史。
pub struct MessageGenerator {
    provider: Arc<dyn CompletionProvider>,
    cache: Arc<dyn CacheStore>,
    history: Mutex<VecDeque<GeneratedMessage>>,
    max_tokens: u32,
}

impl MessageGenerator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        cache: Arc<dyn CacheStore>,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            cache,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LIMIT)),
            max_tokens,
        }
    }

    /// 规范化参数后取 SHA-256 指纹，相同的逻辑输入必然得到相同的键
    pub fn cache_key(params: &GenerateParams) -> String {
        let normalized = format!(
            "{}|{}",
            params.recipient_name.trim().to_lowercase(),
            params.special_moments.trim().to_lowercase()
        );
        let digest = Sha256::digest(normalized.as_bytes());
        format!("{}{:x}", CACHE_KEY_PREFIX, digest)
    }

    fn validate(params: &GenerateParams) -> Result<(), HashMap<String, String>> {
        let mut field_errors = HashMap::new();
        if params.recipient_name.trim().is_empty() {
            field_errors.insert(
                "recipient_name".to_string(),
                "请填写对方的称呼".to_string(),
            );
        }
        if params.special_moments.trim().is_empty() {
            field_errors.insert(
                "special_moments".to_string(),
                "请填写想提到的特别时刻".to_string(),
            );
        }
        if field_errors.is_empty() {
            Ok(())
        } else {
            Err(field_errors)
        }
    }

    fn build_prompt(params: &GenerateParams) -> String {
        format!(
            "请以深情自然的语气，为{}写一段三句以内的浪漫情话，提到这些特别的时刻：{}",
            params.recipient_name.trim(),
            params.special_moments.trim()
        )
    }

    pub async fn generate(
        &self,
        params: &GenerateParams,
    ) -> Result<GenerationOutcome, GenerateError> {
        Self::validate(params).map_err(GenerateError::Validation)?;

        let key = Self::cache_key(params);

        // 命中缓存直接返回，不调上游也不重复记历史
        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!("Generation cache hit: {}", key);
            return Ok(GenerationOutcome {
                text: cached,
                from_cache: true,
                recipient_name: params.recipient_name.trim().to_string(),
                created_at: Utc::now(),
            });
        }

        let prompt = Self::build_prompt(params);
        let started = Instant::now();
        let response = self
            .provider
            .complete(&prompt, self.max_tokens)
            .await
            .map_err(|e| GenerateError::Upstream(e.to_string()))?;
        tracing::debug!(
            "Completion provider call took {}ms",
            started.elapsed().as_millis()
        );

        // 合法响应至少要有一条非空文本，否则视为上游错误，不落缓存不记历史
        let text = response
            .choices
            .first()
            .map(|choice| choice.text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                GenerateError::Upstream("completion response contained no usable text".to_string())
            })?;

        self.cache.set(&key, &text).await;

        let message = GeneratedMessage {
            recipient_name: params.recipient_name.trim().to_string(),
            content: text.clone(),
            created_at: Utc::now(),
        };
        self.record(message.clone());

        Ok(GenerationOutcome {
            text,
            from_cache: false,
            recipient_name: message.recipient_name,
            created_at: message.created_at,
        })
    }

    /// 最近的生成记录快照，最新的在末尾，最多 HISTORY_LIMIT 条
    pub fn recent(&self) -> Vec<GeneratedMessage> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.iter().cloned().collect()
    }

    fn record(&self, message: GeneratedMessage) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.push_back(message);
        while history.len() > HISTORY_LIMIT {
            history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvider {
        responses: Mutex<VecDeque<Result<CompletionResponse, ProviderError>>>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(responses: Vec<Result<CompletionResponse, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn with_text(text: &str) -> Self {
            Self::new(vec![Ok(CompletionResponse {
                choices: vec![CompletionChoice {
                    text: text.to_string(),
                }],
            })])
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionProvider for FakeProvider {
        async fn complete(
            &self,
            _prompt: &str,
            _max_tokens: u32,
        ) -> Result<CompletionResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(CompletionResponse {
                        choices: vec![CompletionChoice {
                            text: "默认情话".to_string(),
                        }],
                    })
                })
        }
    }

    #[derive(Default)]
    struct FakeCache {
        entries: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl CacheStore for FakeCache {
        async fn get(&self, key: &str) -> Option<String> {
            self.entries.lock().unwrap().get(key).cloned()
        }

        async fn set(&self, key: &str, value: &str) {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }
    }

    fn params(name: &str, moments: &str) -> GenerateParams {
        GenerateParams {
            recipient_name: name.to_string(),
            special_moments: moments.to_string(),
        }
    }

    fn generator(provider: FakeProvider) -> (MessageGenerator, Arc<FakeProvider>) {
        let provider = Arc::new(provider);
        let generator = MessageGenerator::new(
            Arc::clone(&provider) as Arc<dyn CompletionProvider>,
            Arc::new(FakeCache::default()),
            120,
        );
        (generator, provider)
    }

    #[tokio::test]
    async fn fresh_generation_then_cached() {
        let (generator, provider) = generator(FakeProvider::with_text("海边的日落只配作你的背景"));

        let first = generator.generate(&params("Ana", "beach trip")).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.text, "海边的日落只配作你的背景");
        assert_eq!(generator.recent().len(), 1);

        let second = generator.generate(&params("Ana", "beach trip")).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.text, first.text);
        // 缓存命中不再调上游，也不重复记历史
        assert_eq!(provider.call_count(), 1);
        assert_eq!(generator.recent().len(), 1);
    }

    #[tokio::test]
    async fn cache_key_ignores_case_and_whitespace() {
        assert_eq!(
            MessageGenerator::cache_key(&params("Ana", "Beach Trip")),
            MessageGenerator::cache_key(&params("  ana  ", "beach trip  "))
        );
        assert_ne!(
            MessageGenerator::cache_key(&params("Ana", "beach trip")),
            MessageGenerator::cache_key(&params("Mia", "beach trip"))
        );
    }

    #[tokio::test]
    async fn missing_fields_fail_validation() {
        let (generator, provider) = generator(FakeProvider::with_text("unused"));

        let err = generator.generate(&params("", "   ")).await.unwrap_err();
        match err {
            GenerateError::Validation(field_errors) => {
                assert!(field_errors.contains_key("recipient_name"));
                assert!(field_errors.contains_key("special_moments"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        // 校验失败不会触碰上游和历史
        assert_eq!(provider.call_count(), 0);
        assert!(generator.recent().is_empty());
    }

    #[tokio::test]
    async fn absent_fields_fall_through_to_validation() {
        // 缺字段的请求体要能完成反序列化，由校验逻辑给出字段级错误
        let params: GenerateParams = serde_json::from_str(r#"{"recipient_name":"Ana"}"#).unwrap();
        assert_eq!(params.special_moments, "");

        let (generator, provider) = generator(FakeProvider::with_text("unused"));
        let err = generator.generate(&params).await.unwrap_err();
        match err {
            GenerateError::Validation(field_errors) => {
                assert!(field_errors.contains_key("special_moments"));
                assert!(!field_errors.contains_key("recipient_name"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(provider.call_count(), 0);

        let empty: GenerateParams = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            generator.generate(&empty).await.unwrap_err(),
            GenerateError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn empty_choices_surface_as_upstream_error() {
        let (generator, _provider) = generator(FakeProvider::new(vec![Ok(CompletionResponse {
            choices: vec![],
        })]));

        let err = generator.generate(&params("Ana", "beach trip")).await.unwrap_err();
        assert!(matches!(err, GenerateError::Upstream(_)));
        assert!(generator.recent().is_empty());

        // 失败不落缓存，重试会再次调上游
        let retry = generator.generate(&params("Ana", "beach trip")).await.unwrap();
        assert!(!retry.from_cache);
    }

    #[tokio::test]
    async fn whitespace_only_text_surfaces_as_upstream_error() {
        let (generator, _provider) = generator(FakeProvider::with_text("   "));

        let err = generator.generate(&params("Ana", "beach trip")).await.unwrap_err();
        assert!(matches!(err, GenerateError::Upstream(_)));
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_upstream_error() {
        let (generator, _provider) =
            generator(FakeProvider::new(vec![Err(ProviderError::Timeout)]));

        let err = generator.generate(&params("Ana", "beach trip")).await.unwrap_err();
        match err {
            GenerateError::Upstream(details) => assert!(details.contains("timed out")),
            other => panic!("expected upstream error, got {:?}", other),
        }
        assert!(generator.recent().is_empty());
    }

    #[tokio::test]
    async fn history_keeps_last_ten_most_recent_last() {
        let (generator, _provider) = generator(FakeProvider::new(Vec::new()));

        for i in 0..12 {
            generator
                .generate(&params(&format!("人{}", i), &format!("时刻{}", i)))
                .await
                .unwrap();
        }

        let recent = generator.recent();
        assert_eq!(recent.len(), HISTORY_LIMIT);
        assert_eq!(recent.first().unwrap().recipient_name, "人2");
        assert_eq!(recent.last().unwrap().recipient_name, "人11");
        for pair in recent.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }
}
