use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::RwLock;

use crate::quiz::QuizQuestion;

pub const DEFAULT_MOVIES_URL: &str = "https://tv-api.com/en/API/Top250Movies/k_zcuw1ytf";

const MIN_RATING_THRESHOLD: u32 = 7;
const MAX_RATING_THRESHOLD: u32 = 9;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("network request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not decode the movie list: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("the movie service reported an error: {0}")]
    Service(String),
    #[error("the movie list is empty")]
    EmptyList,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MostPopularMovies {
    #[serde(rename = "errorMessage", default)]
    pub error_message: String,
    #[serde(default)]
    pub items: Vec<MostPopularMovie>,
}

impl MostPopularMovies {
    /// A non-empty error field or an empty list both count as a failed load.
    fn into_items(self) -> Result<Vec<MostPopularMovie>, LoadError> {
        if !self.error_message.is_empty() {
            return Err(LoadError::Service(self.error_message));
        }
        if self.items.is_empty() {
            return Err(LoadError::EmptyList);
        }
        Ok(self.items)
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MostPopularMovie {
    #[serde(rename = "fullTitle")]
    pub title: String,
    #[serde(rename = "imDbRating")]
    pub rating: String,
    #[serde(rename = "image")]
    pub image_url: String,
}

/// Builds one yes/no question from a movie: "is the rating above the
/// threshold?" The rating comes in as a string; an unparsable one counts
/// as 0 so the question stays answerable.
pub fn rating_question(movie: &MostPopularMovie, threshold: u32) -> QuizQuestion {
    let rating: f64 = movie.rating.parse().unwrap_or(0.0);
    QuizQuestion::new(
        movie.image_url.clone(),
        format!("Is the rating of this film higher than {threshold}?"),
        rating > threshold as f64,
    )
}

/// Fetches the top-rated movie list once and hands out one random question
/// per request.
pub struct MovieProvider {
    client: reqwest::Client,
    url: String,
    movies: RwLock<Vec<MostPopularMovie>>,
}

impl MovieProvider {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            movies: RwLock::new(Vec::new()),
        }
    }

    /// One-shot fetch of the movie list. Replaces any previously cached
    /// list on success.
    pub async fn load(&self) -> Result<(), LoadError> {
        debug!("loading movie list from {}", self.url);
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let decoded: MostPopularMovies = serde_json::from_str(&body)?;
        let items = decoded.into_items()?;

        info!("loaded {} movies", items.len());
        *self.movies.write().await = items;
        Ok(())
    }

    /// Yields one question built from a random movie, or `None` when the
    /// list has not been loaded. Exactly one question per call.
    pub async fn next_question(&self) -> Option<QuizQuestion> {
        let movies = self.movies.read().await;
        let movie = movies.choose(&mut rand::thread_rng())?.clone();
        drop(movies);

        let threshold = rand::thread_rng().gen_range(MIN_RATING_THRESHOLD..=MAX_RATING_THRESHOLD);
        Some(rating_question(&movie, threshold))
    }

    #[cfg(test)]
    async fn set_movies(&self, movies: Vec<MostPopularMovie>) {
        *self.movies.write().await = movies;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(title: &str, rating: &str) -> MostPopularMovie {
        MostPopularMovie {
            title: title.to_string(),
            rating: rating.to_string(),
            image_url: format!("https://img.example/{title}.jpg"),
        }
    }

    #[test]
    fn decodes_the_remote_field_names() {
        let body = r#"{
            "errorMessage": "",
            "items": [
                {"fullTitle": "The Shawshank Redemption (1994)", "imDbRating": "9.2", "image": "https://img.example/shawshank.jpg"}
            ]
        }"#;

        let decoded: MostPopularMovies = serde_json::from_str(body).unwrap();
        assert_eq!(decoded.items.len(), 1);
        assert_eq!(decoded.items[0].title, "The Shawshank Redemption (1994)");
        assert_eq!(decoded.items[0].rating, "9.2");
        assert_eq!(decoded.items[0].image_url, "https://img.example/shawshank.jpg");
    }

    #[test]
    fn service_error_message_fails_the_load() {
        let decoded = MostPopularMovies {
            error_message: "Invalid API Key".to_string(),
            items: vec![movie("A", "8.0")],
        };

        assert!(matches!(decoded.into_items(), Err(LoadError::Service(_))));
    }

    #[test]
    fn empty_list_fails_the_load() {
        let decoded = MostPopularMovies::default();
        assert!(matches!(decoded.into_items(), Err(LoadError::EmptyList)));
    }

    #[test]
    fn question_is_true_when_rating_beats_threshold() {
        let question = rating_question(&movie("A", "9.2"), 8);
        assert!(question.correct_answer);
        assert_eq!(question.text, "Is the rating of this film higher than 8?");
        assert!(!question.image_url.is_empty());
    }

    #[test]
    fn question_is_false_when_rating_is_below_threshold() {
        let question = rating_question(&movie("A", "7.5"), 8);
        assert!(!question.correct_answer);
    }

    #[test]
    fn unparsable_rating_counts_as_zero() {
        let question = rating_question(&movie("A", "n/a"), 7);
        assert!(!question.correct_answer);
    }

    #[tokio::test]
    async fn next_question_is_none_before_the_list_is_loaded() {
        let provider = MovieProvider::new("http://unused.example".to_string());
        assert!(provider.next_question().await.is_none());
    }

    #[tokio::test]
    async fn next_question_uses_the_cached_list() {
        let provider = MovieProvider::new("http://unused.example".to_string());
        provider.set_movies(vec![movie("Heat (1995)", "8.3")]).await;

        let question = provider.next_question().await.unwrap();
        assert_eq!(question.image_url, "https://img.example/Heat (1995).jpg");
        assert!(question.text.starts_with("Is the rating of this film"));
    }
}
