use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use voice_tutor::audio::{read_wav, AudioDeviceFactory, MicrophoneSource};
use voice_tutor::camera::{Camera, JpegFileCamera, NoCamera};
use voice_tutor::session::{
    self, BackendExchange, ChatExchange, LessonExchange, ObjectsExchange, Role,
};
use voice_tutor::{
    create_router, AppState, BackendClient, Config, Language, QuizSession, SessionConfig,
    SessionMode, VoiceSession,
};

#[derive(Parser)]
#[command(name = "voice-tutor")]
#[command(about = "Voice interaction controller for the tutoring assistant", version)]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/voice-tutor")]
    config: String,

    /// Interaction language (bn or en); overrides the config
    #[arg(short, long)]
    language: Option<Language>,

    /// Write every spoken reply as a WAV file here
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to the assistant once
    Chat {
        /// WAV file to speak
        #[arg(long, conflicts_with = "text")]
        audio: Option<PathBuf>,

        /// Typed message
        #[arg(long)]
        text: Option<String>,
    },

    /// Start a lesson and optionally keep it going
    Lesson {
        #[arg(long)]
        topic: String,

        /// WAV file with a spoken question asked after the opening segment
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Number of follow-up segments to request
        #[arg(long = "continue", default_value_t = 0)]
        continues: u32,
    },

    /// Ask what the camera sees
    Objects {
        /// WAV file with the spoken question
        #[arg(long)]
        audio: PathBuf,

        /// JPEG used as the camera frame
        #[arg(long)]
        image: PathBuf,
    },

    /// Run a quiz with the given answers
    Quiz {
        #[arg(long)]
        topic: String,

        /// Comma-separated answers, one per question
        #[arg(long, value_delimiter = ',')]
        answers: Vec<String>,
    },

    /// List available lessons
    Lessons,

    /// Serve the local control API
    Serve {
        #[arg(long, value_enum, default_value_t = ModeArg::Chat)]
        mode: ModeArg,

        /// Lesson topic (lesson mode)
        #[arg(long)]
        topic: Option<String>,

        /// WAV file used as the microphone
        #[arg(long)]
        microphone: Option<PathBuf>,

        /// JPEG used as the camera frame (objects mode)
        #[arg(long)]
        camera: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Chat,
    Lesson,
    Objects,
}

impl From<ModeArg> for SessionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Chat => SessionMode::Chat,
            ModeArg::Lesson => SessionMode::Lesson,
            ModeArg::Objects => SessionMode::Objects,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = Config::load(&cli.config)?;
    if let Some(language) = cli.language {
        cfg.session.language = language;
    }
    if cli.output_dir.is_some() {
        cfg.audio.output_dir = cli.output_dir.clone();
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.logging.level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Backend: {}", cfg.backend.base_url());

    let client = BackendClient::from_config(&cfg.backend)
        .context("Failed to create backend client")?;

    match cli.command {
        Commands::Chat { audio, text } => chat(&cfg, client, audio, text).await,
        Commands::Lesson {
            topic,
            audio,
            continues,
        } => lesson(&cfg, client, topic, audio, continues).await,
        Commands::Objects { audio, image } => objects(&cfg, client, audio, image).await,
        Commands::Quiz { topic, answers } => quiz(&cfg, client, topic, answers).await,
        Commands::Lessons => lessons(&cfg, client).await,
        Commands::Serve {
            mode,
            topic,
            microphone,
            camera,
        } => serve(&cfg, client, mode.into(), topic, microphone, camera).await,
    }
}

fn build_session(
    cfg: &Config,
    mode: SessionMode,
    exchange: Arc<dyn BackendExchange>,
    microphone: Option<PathBuf>,
) -> VoiceSession {
    let source = match microphone {
        Some(path) => MicrophoneSource::File(path),
        None => MicrophoneSource::Unavailable,
    };
    VoiceSession::new(
        SessionConfig::from_config(cfg, mode),
        exchange,
        AudioDeviceFactory::microphone(source),
        AudioDeviceFactory::output(cfg.audio.output_dir.clone()),
    )
}

/// Record the whole file as one utterance and wait for the spoken reply
async fn speak_file(session: &mut VoiceSession, path: &Path) -> Result<()> {
    let (spec, samples) = read_wav(path)?;
    let seconds = samples.len() as f64 / (spec.sample_rate as f64 * spec.channels.max(1) as f64);

    session.start_speaking().await?;
    tokio::time::sleep(Duration::from_secs_f64(seconds) + Duration::from_millis(200)).await;
    session.stop_speaking().await?;
    session.settle().await;
    Ok(())
}

fn print_transcript(session: &VoiceSession) {
    for entry in session.transcript() {
        let who = match entry.role {
            Role::User => "you",
            Role::Assistant => "tutor",
        };
        println!("{:>5}: {}", who, entry.text);
    }
}

fn check_error(session: &VoiceSession) -> Result<()> {
    match session.last_error() {
        Some(message) => bail!("{}", message),
        None => Ok(()),
    }
}

async fn chat(
    cfg: &Config,
    client: BackendClient,
    audio: Option<PathBuf>,
    text: Option<String>,
) -> Result<()> {
    let exchange = Arc::new(ChatExchange::new(client));
    let mut session = build_session(cfg, SessionMode::Chat, exchange, audio.clone());

    match (audio, text) {
        (Some(path), _) => speak_file(&mut session, &path).await?,
        (None, Some(text)) => {
            session.send_text(&text)?;
            session.settle().await;
        }
        (None, None) => bail!("Pass --audio or --text"),
    }

    print_transcript(&session);
    check_error(&session)
}

async fn lesson(
    cfg: &Config,
    client: BackendClient,
    topic: String,
    audio: Option<PathBuf>,
    continues: u32,
) -> Result<()> {
    let exchange = Arc::new(LessonExchange::new(client, topic.clone()));
    let mut session = build_session(cfg, SessionMode::Lesson, exchange, audio.clone());

    info!("Starting lesson: {}", topic);
    session.start_lesson()?;
    session.settle().await;
    check_error(&session)?;
    println!("{}", session.lesson().current_text);

    if let Some(path) = audio {
        speak_file(&mut session, &path).await?;
        check_error(&session)?;
    }

    for _ in 0..continues {
        session.continue_lesson()?;
        session.settle().await;
        check_error(&session)?;
        println!("{}", session.lesson().current_text);
    }

    session.teardown();
    Ok(())
}

async fn objects(
    cfg: &Config,
    client: BackendClient,
    audio: PathBuf,
    image: PathBuf,
) -> Result<()> {
    let camera: Arc<dyn Camera> = Arc::new(JpegFileCamera::new(image));
    let exchange = Arc::new(ObjectsExchange::new(client, camera));
    let mut session = build_session(cfg, SessionMode::Objects, exchange, Some(audio.clone()));

    speak_file(&mut session, &audio).await?;
    check_error(&session)
}

async fn quiz(
    cfg: &Config,
    client: BackendClient,
    topic: String,
    answers: Vec<String>,
) -> Result<()> {
    let mut quiz = QuizSession::new(
        Arc::new(client),
        AudioDeviceFactory::output(cfg.audio.output_dir.clone()),
        cfg.session.language,
        Duration::from_millis(cfg.session.quiz_advance_ms),
    );

    quiz.load(&topic).await?;
    quiz.settle().await;

    for answer in answers {
        if quiz.run().finished {
            warn!("Quiz already finished; ignoring answer {}", answer);
            break;
        }
        let number = quiz.run().index + 1;
        match quiz.answer(&answer) {
            Some(feedback) => println!("Q{}: {} -> {:?}", number, answer, feedback),
            None => warn!("Answer {} was not taken", answer),
        }
        quiz.settle().await;
    }

    let run = quiz.run();
    println!("Score: {} / {}", run.score, run.total());
    quiz.teardown();
    Ok(())
}

async fn lessons(cfg: &Config, client: BackendClient) -> Result<()> {
    let lessons = client.lessons().await.context("Failed to load lessons")?;
    for lesson in lessons {
        let title = cfg
            .session
            .language
            .pick(&lesson.title_bn, &lesson.title_en);
        println!("{:>4}  {}", lesson.id, title);
    }
    Ok(())
}

async fn serve(
    cfg: &Config,
    client: BackendClient,
    mode: SessionMode,
    topic: Option<String>,
    microphone: Option<PathBuf>,
    camera: Option<PathBuf>,
) -> Result<()> {
    let exchange: Arc<dyn BackendExchange> = match mode {
        SessionMode::Chat => Arc::new(ChatExchange::new(client)),
        SessionMode::Lesson => {
            let topic = topic.context("--topic is required in lesson mode")?;
            Arc::new(LessonExchange::new(client, topic))
        }
        SessionMode::Objects => {
            let camera: Arc<dyn Camera> = match camera {
                Some(path) => Arc::new(JpegFileCamera::new(path)),
                None => Arc::new(NoCamera),
            };
            Arc::new(ObjectsExchange::new(client, camera))
        }
    };

    let voice = build_session(cfg, mode, exchange, microphone);
    let (handle, driver) = session::spawn(voice);
    let app = create_router(AppState::new(handle.clone()));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Control API listening on http://{} ({} mode)", addr, mode);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    handle.teardown().await.ok();
    drop(handle);
    driver.await.ok();
    Ok(())
}
