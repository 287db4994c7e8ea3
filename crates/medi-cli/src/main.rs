use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use medi_client::OpenAiGenerator;
use medi_client::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use medi_core::case::CaseDraft;
use medi_core::models::Difficulty;
use medi_core::quiz::{QuizDraft, QuizSource};
use medi_core::traits::{ChatMessage, CompletionRequest, TextGenerator};
use medi_core::tutor::{
    QUIZ_GENERATOR_PROMPT, parse_generated_questions, quiz_generation_prompt,
    validate_question_count,
};
use medi_core::user::{Role, User};
use medi_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "medi", version, about = "Operator tools for the Medi learning platform")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Change the role of an existing user
    SetRole {
        /// Email address the user signed in with
        #[arg(short, long)]
        email: String,

        /// student, educator, or admin
        #[arg(short, long)]
        role: Role,
    },

    /// Import clinical cases from a JSON array file
    ImportCases {
        /// Path to a JSON file containing an array of cases
        #[arg(short, long)]
        file: PathBuf,

        /// Email of the user recorded as author
        #[arg(short, long)]
        author_email: String,

        /// Publish every imported case, overriding the file
        #[arg(long, default_value_t = false)]
        publish: bool,
    },

    /// Generate a quiz with the configured model and store it
    GenerateQuiz {
        /// Subject of the questions
        #[arg(short, long)]
        topic: String,

        /// Email of the user who will own the quiz
        #[arg(short, long)]
        owner_email: String,

        /// Number of questions
        #[arg(short, long, default_value_t = 5)]
        count: usize,

        /// beginner, intermediate, or advanced
        #[arg(short, long, default_value = "intermediate")]
        difficulty: Difficulty,

        /// Make the quiz visible to every user
        #[arg(long, default_value_t = false)]
        public: bool,

        /// LLM model to use
        #[arg(long, env = "MEDI_AI_MODEL", default_value = DEFAULT_MODEL)]
        model: String,

        /// OpenAI-compatible API base URL
        #[arg(long, env = "MEDI_AI_BASE_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// API key (reads from MEDI_AI_API_KEY if not provided)
        #[arg(long, env = "MEDI_AI_API_KEY", hide_env_values = true)]
        api_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("medi=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = connect_db().await?;

    match cli.command {
        Commands::Migrate => {
            db.migrate().await.context("Failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::SetRole { email, role } => {
            db.migrate().await?;
            cmd_set_role(&db, &email, role).await?;
        }
        Commands::ImportCases {
            file,
            author_email,
            publish,
        } => {
            db.migrate().await?;
            cmd_import_cases(&db, &file, &author_email, publish).await?;
        }
        Commands::GenerateQuiz {
            topic,
            owner_email,
            count,
            difficulty,
            public,
            model,
            base_url,
            api_key,
        } => {
            db.migrate().await?;
            let generator = OpenAiGenerator::with_base_url(&api_key, &model, &base_url)?;
            let request = QuizRequest {
                topic: &topic,
                count,
                difficulty,
                public,
            };
            cmd_generate_quiz(&db, &generator, &owner_email, request).await?;
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env()?;
    Database::connect(&config)
        .await
        .context("Failed to connect to database")
}

async fn find_user(db: &Database, email: &str) -> Result<User> {
    db.user_repo()
        .find_by_email(email)
        .await?
        .with_context(|| format!("No user with email {email}. They must sign in once first."))
}

async fn cmd_set_role(db: &Database, email: &str, role: Role) -> Result<()> {
    let user = db.user_repo().set_role(email, role).await?;
    tracing::info!(user_id = %user.id, role = %role.as_str(), "Role updated");
    println!("{} is now {}", email, user.role.as_str());
    Ok(())
}

/// Parse a case file, applying `--publish` and validating every entry.
fn load_cases(path: &Path, publish: bool) -> Result<Vec<CaseDraft>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read case file: {}", path.display()))?;
    parse_cases(&raw, publish)
}

fn parse_cases(raw: &str, publish: bool) -> Result<Vec<CaseDraft>> {
    let mut drafts: Vec<CaseDraft> =
        serde_json::from_str(raw).context("Case file must be a JSON array of cases")?;

    for (i, draft) in drafts.iter_mut().enumerate() {
        if publish {
            draft.published = true;
        }
        draft
            .validate()
            .with_context(|| format!("Case #{} ({:?}) is invalid", i + 1, draft.title))?;
    }
    Ok(drafts)
}

async fn cmd_import_cases(
    db: &Database,
    path: &Path,
    author_email: &str,
    publish: bool,
) -> Result<()> {
    let drafts = load_cases(path, publish)?;
    let author = find_user(db, author_email).await?;
    if !author.role.can_author_cases() {
        tracing::warn!(user_id = %author.id, "Importing cases for a user who cannot author them");
    }

    let repo = db.case_repo();
    for draft in &drafts {
        let case = repo.create(author.id, draft).await?;
        tracing::info!(case_id = %case.id, title = %case.title, "Case imported");
    }

    println!("Imported {} cases for {}", drafts.len(), author_email);
    Ok(())
}

struct QuizRequest<'a> {
    topic: &'a str,
    count: usize,
    difficulty: Difficulty,
    public: bool,
}

async fn cmd_generate_quiz(
    db: &Database,
    generator: &dyn TextGenerator,
    owner_email: &str,
    request: QuizRequest<'_>,
) -> Result<()> {
    validate_question_count(request.count)?;
    let owner = find_user(db, owner_email).await?;

    tracing::info!(topic = %request.topic, count = request.count, "Generating quiz ...");
    let prompt = quiz_generation_prompt(request.topic, request.difficulty, request.count, None);
    let completion = generator
        .complete(
            CompletionRequest::new(vec![ChatMessage::user(prompt)])
                .with_system(QUIZ_GENERATOR_PROMPT)
                .json(),
        )
        .await?;

    let questions = parse_generated_questions(&completion.text, request.count)?;

    let draft = QuizDraft {
        title: format!("{} quiz", request.topic),
        topic: request.topic.to_string(),
        difficulty: request.difficulty,
        case_id: None,
        questions,
        is_public: request.public,
        time_limit_secs: None,
    };
    draft.validate()?;

    let quiz = db
        .quiz_repo()
        .create(owner.id, &draft, QuizSource::Generated)
        .await?;
    tracing::info!(quiz_id = %quiz.id, model = %completion.model, "Quiz stored");

    for (i, question) in quiz.questions.iter().enumerate() {
        println!("{}. {}", i + 1, question.prompt);
        for (j, option) in question.options.iter().enumerate() {
            let marker = if j == question.correct_index { "*" } else { " " };
            println!("   {marker} {option}");
        }
    }
    println!("\nSaved quiz {} ({} questions)", quiz.id, quiz.questions.len());

    Ok(())
}
