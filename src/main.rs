mod quiz;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use dotenv::dotenv;
use log::error;
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatAction, InputFile, KeyboardButton, KeyboardMarkup},
};
use url::Url;

use quiz::movies::{MovieProvider, DEFAULT_MOVIES_URL};
use quiz::session::{
    Effect, QuizSession, ERROR_TITLE, FEEDBACK_DELAY, LOAD_FAILED_MESSAGE,
};
use quiz::stats::FileStatistics;
use quiz::{QuizResults, QuizStep};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type QuizStorage = std::sync::Arc<ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    Menu,
    Playing {
        session: QuizSession,
    },
}

/// Where the per-chat statistics files live.
#[derive(Clone)]
struct StatsDir(PathBuf);

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting movie quiz bot...");

    let bot = Bot::from_env();

    let db_path = std::env::var("QUIZ_DB_PATH").unwrap_or_else(|_| "db.sqlite".to_string());
    log::info!("Establishing connection to the dialogue database...");
    let storage: QuizStorage = SqliteStorage::open(&db_path, Json)
        .await
        .expect("Failed to open the dialogue database")
        .erase();
    log::info!("Connection established");

    let movies_url =
        std::env::var("MOVIES_API_URL").unwrap_or_else(|_| DEFAULT_MOVIES_URL.to_string());
    let provider = Arc::new(MovieProvider::new(movies_url));
    let provider_for_menu = provider.clone();
    let provider_for_quiz = provider;

    let stats_dir = StatsDir(
        std::env::var("QUIZ_STATS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("stats")),
    );
    let stats_dir_for_menu = stats_dir.clone();
    let stats_dir_for_quiz = stats_dir;

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::Menu].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, msg: Message| {
                    menu(
                        provider_for_menu.clone(),
                        stats_dir_for_menu.clone(),
                        bot,
                        dialogue,
                        msg,
                    )
                },
            ))
            .branch(dptree::case![State::Playing { session }].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, session: QuizSession, msg: Message| {
                    playing(
                        provider_for_quiz.clone(),
                        stats_dir_for_quiz.clone(),
                        bot,
                        dialogue,
                        session,
                        msg,
                    )
                },
            )),
    )
    .dependencies(dptree::deps![storage])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

const GREETING_TEXT: &str =
    "Hi! I'm the movie quiz bot. I'll show you a film poster and ask about its rating -- answer Yes or No!";
const START_QUIZ_BUTTON: &str = "Start quiz";
const YES_BUTTON: &str = "Yes";
const NO_BUTTON: &str = "No";
const PLAY_AGAIN_BUTTON: &str = "Play again";
const TRY_AGAIN_BUTTON: &str = "Try again";
const CORRECT_FEEDBACK: &str = "Correct!";
const WRONG_FEEDBACK: &str = "Wrong!";

fn menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(START_QUIZ_BUTTON)]])
}

fn answer_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(YES_BUTTON),
        KeyboardButton::new(NO_BUTTON),
    ]])
}

fn play_again_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(PLAY_AGAIN_BUTTON)]])
}

fn retry_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(TRY_AGAIN_BUTTON)]])
}

async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(menu_keyboard())
        .await?;

    dialogue.update(State::Menu).await?;
    Ok(())
}

async fn menu(
    provider: Arc<MovieProvider>,
    stats_dir: StatsDir,
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(START_QUIZ_BUTTON) => {
            let mut session = QuizSession::new();
            let effects = session.start();

            let mut stats = FileStatistics::for_chat(&stats_dir.0, msg.chat.id.0);
            run_effects(&bot, msg.chat.id, &mut session, &provider, &mut stats, effects).await?;

            dialogue.update(State::Playing { session }).await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please pick an option")
                .reply_markup(menu_keyboard())
                .await?;
        }
    }
    Ok(())
}

async fn playing(
    provider: Arc<MovieProvider>,
    stats_dir: StatsDir,
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: QuizSession,
    msg: Message,
) -> HandlerResult {
    let mut stats = FileStatistics::for_chat(&stats_dir.0, msg.chat.id.0);

    let effects = match msg.text() {
        Some(YES_BUTTON) => session.submit_answer(true),
        Some(NO_BUTTON) => session.submit_answer(false),
        Some(TRY_AGAIN_BUTTON) => session.retry(),
        Some(PLAY_AGAIN_BUTTON) if session.is_showing_results() => session.restart(),
        _ => {
            bot.send_message(msg.chat.id, "Please answer with the buttons below")
                .await?;
            Vec::new()
        }
    };

    run_effects(&bot, msg.chat.id, &mut session, &provider, &mut stats, effects).await?;

    dialogue.update(State::Playing { session }).await?;
    Ok(())
}

/// Executes the effects a session handed back, feeding provider and timer
/// outcomes straight into the next session event until the queue drains.
async fn run_effects(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut QuizSession,
    provider: &MovieProvider,
    stats: &mut FileStatistics,
    effects: Vec<Effect>,
) -> HandlerResult {
    let mut queue: VecDeque<Effect> = effects.into();

    while let Some(effect) = queue.pop_front() {
        match effect {
            Effect::RenderStep(step) => send_step(bot, chat_id, step).await?,
            Effect::RenderFeedback { is_correct } => {
                let text = if is_correct { CORRECT_FEEDBACK } else { WRONG_FEEDBACK };
                bot.send_message(chat_id, text).await?;
            }
            Effect::RenderResults(results) => send_results(bot, chat_id, results).await?,
            Effect::RenderLoading(visible) => {
                if visible {
                    // It adds to the user's experience if it works, so the
                    // outcome doesn't matter here
                    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;
                }
            }
            Effect::RenderError(message) => {
                bot.send_message(chat_id, format!("{ERROR_TITLE}\n{message}"))
                    .reply_markup(retry_keyboard())
                    .await?;
            }
            // A chat has no buttons to grey out; the session's own state
            // flag is what ignores taps while feedback is pending
            Effect::SetInputEnabled(_) => {}
            Effect::LoadQuestions { .. } => {
                let followup = match provider.load().await {
                    Ok(()) => session.questions_ready(),
                    Err(err) => {
                        error!("movie list load failed: {err}");
                        session.load_failed(LOAD_FAILED_MESSAGE)
                    }
                };
                queue.extend(followup);
            }
            Effect::RequestQuestion { generation } => {
                let question = provider.next_question().await;
                queue.extend(session.question_delivered(generation, question));
            }
            Effect::AwaitFeedback { generation } => {
                tokio::time::sleep(FEEDBACK_DELAY).await;
                queue.extend(session.feedback_elapsed(generation, stats));
            }
        }
    }
    Ok(())
}

async fn send_step(bot: &Bot, chat_id: ChatId, step: QuizStep) -> HandlerResult {
    let caption = format!("{}\n\nQuestion {}", step.question, step.position);

    match Url::parse(&step.image_url) {
        Ok(poster) => {
            bot.send_photo(chat_id, InputFile::url(poster))
                .caption(caption)
                .reply_markup(answer_keyboard())
                .await?;
        }
        Err(err) => {
            // A broken poster link shouldn't eat the round
            error!("unusable poster url {}: {err}", step.image_url);
            bot.send_message(chat_id, caption)
                .reply_markup(answer_keyboard())
                .await?;
        }
    }
    Ok(())
}

async fn send_results(bot: &Bot, chat_id: ChatId, results: QuizResults) -> HandlerResult {
    let best = results.best_game;
    let best_date = best
        .finished_at
        .map(|date| date.format("%d.%m.%y %H:%M").to_string())
        .unwrap_or_else(|| "--".to_string());

    let message = format!(
        "{}\n{}\nAverage accuracy: {:.2}%\nGames played: {}\nRecord: {}/{} ({})",
        results.title,
        results.text,
        results.total_accuracy,
        results.games_count,
        best.correct,
        best.total,
        best_date,
    );

    bot.send_message(chat_id, message)
        .reply_markup(play_again_keyboard())
        .await?;
    Ok(())
}
