//! Conversational session over the document query pipeline
//!
//! Every message is first answered from the conversation history. When the
//! model says it lacks information, the user is offered a document query.

use reportrag_common::{Embedder, LanguageModel};
use reportrag_search::{QueryPipeline, UNAVAILABLE_ANSWER};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Shown before asking whether to run a document query
pub const QUERY_OFFER: &str = "I am an AI assistant specialized in helping you query and explore your documents. \
For questions outside general conversation, I can fetch the latest data. \
Do you want me to run a query for this?";

/// Answer when the user declines the document query
pub const CONTINUE_ANSWER: &str = "Let's continue the conversation. Ask me something else!";

/// Phrases by which the model signals it needs new data
const NO_INFORMATION_MARKERS: [&str; 2] = ["don't have enough information", "cannot answer"];

/// One exchange of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub bot: String,
}

/// Asked whether to run a document query after the model could not answer
pub trait QueryConfirmer: Send + Sync {
    /// The query to run, or `None` to keep chatting
    fn confirm_query(&self, offer: &str) -> Option<String>;
}

pub struct ChatSession {
    llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    pipeline: QueryPipeline,
    confirmer: Arc<dyn QueryConfirmer>,
    history: VecDeque<Turn>,
    max_history: usize,
}

impl ChatSession {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        pipeline: QueryPipeline,
        confirmer: Arc<dyn QueryConfirmer>,
        max_history: usize,
    ) -> Self {
        Self {
            llm,
            embedder,
            pipeline,
            confirmer,
            history: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// Retained turns, oldest first
    pub fn history(&self) -> &VecDeque<Turn> {
        &self.history
    }

    /// Answer a free-text message
    #[instrument(skip_all, fields(history = self.history.len()))]
    pub async fn respond(&mut self, input: &str) -> String {
        let prompt = history_prompt(&self.history, input);

        let answer = match self.llm.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("Empty chat answer");
                return self.fail(input);
            }
            Err(e) => {
                warn!(error = %e, "Chat answer failed");
                return self.fail(input);
            }
        };

        self.record(input, &answer);

        if !lacks_information(&answer) {
            return answer;
        }

        info!("Model lacks information, offering a document query");
        match self.confirmer.confirm_query(QUERY_OFFER) {
            Some(query) => {
                let result = self.run_new_query(&query).await;
                self.record(&query, &result);
                result
            }
            None => {
                self.record(input, CONTINUE_ANSWER);
                CONTINUE_ANSWER.to_string()
            }
        }
    }

    /// Embed the query and run the document pipeline
    pub async fn run_new_query(&self, query: &str) -> String {
        match self.embedder.embed(query).await {
            Ok(embedding) => self.pipeline.run(query, &embedding).await,
            Err(e) => {
                warn!(error = %e, "Query embedding failed");
                UNAVAILABLE_ANSWER.to_string()
            }
        }
    }

    fn fail(&mut self, input: &str) -> String {
        self.record(input, UNAVAILABLE_ANSWER);
        UNAVAILABLE_ANSWER.to_string()
    }

    fn record(&mut self, user: &str, bot: &str) {
        self.history.push_back(Turn {
            user: user.to_string(),
            bot: bot.to_string(),
        });
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }
}

/// Conversation prompt: instructions, the retained turns, the new question
pub fn history_prompt<'a>(history: impl IntoIterator<Item = &'a Turn>, input: &str) -> String {
    let history_text: String = history
        .into_iter()
        .map(|t| format!("User: {}\nBot: {}\n", t.user, t.bot))
        .collect();

    format!(
        "You are a helpful assistant chatbot. Use the following conversation history to answer the user's new question.\n\
         If the question is general chit-chat, respond normally.\n\
         If the answer is not available from previous conversation or requires new data, respond: \"I don't have enough information, please run a new query.\"\n\
         \n\
         Conversation history:\n\
         {history_text}\n\
         New Question: {input}\n\
         \n\
         Answer:\n"
    )
}

/// Whether a model answer asks for new data
pub fn lacks_information(answer: &str) -> bool {
    let lowered = answer.to_lowercase();
    NO_INFORMATION_MARKERS.iter().any(|m| lowered.contains(m))
}
