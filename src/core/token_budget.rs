use crate::domain::models::TokenResult;
use crate::infra::remote_client::RemoteClient;
use anyhow::{anyhow, bail};
use log::{debug, warn};

/// Computes the budget outcome for a token count against a model limit.
pub fn token_result(token_count: i32, input_limit: i32) -> TokenResult {
    let percentage = f64::from(token_count) / f64::from(input_limit) * 100.0;
    let exceeds_limit = token_count > input_limit;
    let limit_error = if exceeds_limit {
        format!(
            "prompt exceeds token limit ({} tokens > {} token limit)",
            token_count, input_limit
        )
    } else {
        String::new()
    };

    TokenResult {
        token_count,
        input_limit,
        exceeds_limit,
        limit_error,
        percentage,
    }
}

/// Looks up the model's input limit, then counts `text` with the remote
/// tokenizer.
pub fn get_token_info(client: Option<&dyn RemoteClient>, text: &str) -> anyhow::Result<TokenResult> {
    let Some(client) = client else {
        bail!("remote client is not configured");
    };

    let info = client
        .model_info()
        .map_err(|e| e.in_phase("failed to get model info for token limit check"))?;
    debug!("Model {} accepts {} input tokens", info.name, info.input_limit);

    let count = client
        .count_tokens(text)
        .map_err(|e| e.in_phase("failed to count tokens for token limit check"))?;

    let result = token_result(count.total, info.input_limit);
    debug!(
        "Token usage: {} / {} ({:.1}%)",
        result.token_count, result.input_limit, result.percentage
    );
    if result.exceeds_limit {
        warn!("{}", result.limit_error);
    }
    Ok(result)
}

/// Strict variant of [`get_token_info`]: exceeding the limit is an error.
pub fn check_token_limit(client: Option<&dyn RemoteClient>, text: &str) -> anyhow::Result<()> {
    let result = get_token_info(client, text)?;
    if result.exceeds_limit {
        return Err(anyhow!(result.limit_error));
    }
    Ok(())
}
