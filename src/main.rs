use chrono::Utc;
use clap::{Arg, ArgAction, ArgMatches, Command};
use l10n_tm::config::{Config, Engine};
use l10n_tm::mt::{
    GoogleTranslateProvider, MachineTranslator, MockMode, MockTranslator, MtProvider, Translator,
};
use l10n_tm::pipeline::{Decoder, RegexDecoder, get_normalized_string};
use l10n_tm::tm::{FsJobStore, FsTmStorage, TmManager};
use l10n_tm::{Flags, JobRequest, TranslationUnit, TuText};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

type CliResult<T> = Result<T, Box<dyn Error>>;

fn cli() -> Command {
    Command::new("l10n-tm")
        .version("0.1.0")
        .about("Placeholder-safe machine translation with a reconciled translation memory")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Project directory containing l10n-tm.json")
                .default_value(".")
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("flatten")
                .about("Show the wire forms of a string with {var} and tag placeholders")
                .arg(Arg::new("text").required(true).index(1)),
        )
        .subcommand(
            Command::new("translate")
                .about("Translate one string, keeping its placeholders")
                .arg(Arg::new("text").required(true).index(1))
                .arg(
                    Arg::new("target")
                        .help("Target language code (e.g., fr, es, de)")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("source")
                        .long("source")
                        .short('s')
                        .help("Source language code (default: from config)"),
                )
                .arg(
                    Arg::new("mock")
                        .long("mock")
                        .short('m')
                        .help("Use the mock engine instead of the configured one")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("guid")
                        .long("guid")
                        .short('g')
                        .help("TU guid used when recording the job")
                        .default_value("cli-message"),
                )
                .arg(
                    Arg::new("record")
                        .long("record")
                        .short('r')
                        .help("Write the job request and response to the job directory")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("sync")
                .about("Reconcile translation memories against the job directory")
                .arg(
                    Arg::new("target")
                        .long("target")
                        .short('t')
                        .help("Only this target language (default: every configured one)"),
                ),
        )
        .subcommand(
            Command::new("lookup")
                .about("Print stored translations of a source string")
                .arg(Arg::new("text").required(true).index(1))
                .arg(Arg::new("target").required(true).index(2)),
        )
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> CliResult<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| format!("missing argument <{}>", name).into())
}

/// Markup tags and `{var}` variables become placeholders; anything else stays plain
fn decode(text: &str) -> TuText {
    let tags = RegexDecoder::xml_tags();
    let vars = RegexDecoder::brace_variables();
    let decoders: [&dyn Decoder; 2] = [&tags, &vars];
    let nstr = get_normalized_string(text, &decoders, &mut Flags::new());
    if nstr.placeholder_count() == 0 {
        TuText::Plain(text.to_string())
    } else {
        TuText::Normalized(nstr)
    }
}

fn configure<T: MachineTranslator>(engine: T, config: &Config) -> CliResult<MtProvider<T>> {
    let provider = &config.provider;
    Ok(MtProvider::new(engine)
        .with_quality(provider.quality)
        .with_chunk_limits(provider.max_chunk_size, provider.max_char_length)
        .with_glossary(config.glossary()?)
        .with_language_map(provider.language_map.clone()))
}

fn translator(config: &Config, mock: bool) -> CliResult<Box<dyn Translator>> {
    if mock || config.provider.engine == Engine::Mock {
        return Ok(Box::new(configure(
            MockTranslator::new(MockMode::Suffix),
            config,
        )?));
    }
    if std::env::var("GOOGLE_TRANSLATE_API_KEY").is_err() {
        eprintln!("GOOGLE_TRANSLATE_API_KEY environment variable not set");
        eprintln!("   Set it with: export GOOGLE_TRANSLATE_API_KEY=your_api_key");
        eprintln!("   Or use --mock to use the mock engine");
        return Err("Missing API key".into());
    }
    Ok(Box::new(configure(GoogleTranslateProvider::from_env()?, config)?))
}

fn manager(config: &Config) -> CliResult<TmManager> {
    let storage = Arc::new(FsTmStorage::new(config.tm_path()));
    let ledger = Arc::new(FsJobStore::new(config.job_path()));
    Ok(TmManager::new(storage, ledger, config.seal()?))
}

fn flatten(matches: &ArgMatches) -> CliResult<()> {
    let text = arg(matches, "text")?;
    let nstr = decode(text).to_normalized();
    let (mangled, _) = l10n_tm::codec::flatten_v1(&nstr);
    let (xml, map) = l10n_tm::codec::flatten_xml_v1(&nstr);
    println!("mangled: {}", mangled);
    println!("xml:     {}", xml);
    for (key, ph) in &map {
        println!("  {:<5} {} {}", key, ph.kind, ph.value);
    }
    Ok(())
}

async fn translate(matches: &ArgMatches, config: &Config) -> CliResult<()> {
    let text = arg(matches, "text")?;
    let target_lang = arg(matches, "target")?;
    let source_lang = matches
        .get_one::<String>("source")
        .map_or(config.source_lang.as_str(), String::as_str);
    let guid = arg(matches, "guid")?;

    let translator = translator(config, matches.get_flag("mock"))?;
    let request = JobRequest {
        job_guid: format!("cli-{}", Utc::now().timestamp_millis()),
        source_lang: source_lang.to_string(),
        target_lang: target_lang.to_string(),
        translation_provider: Some(translator.name().to_string()),
        tus: vec![TranslationUnit::new(guid).with_src(decode(text))],
    };
    let response = translator.request_translations(&request).await?;

    if matches.get_flag("record") {
        let store = FsJobStore::new(config.job_path());
        store.write_request(&request).await?;
        let path = store.write_response(&response).await?;
        info!("Recorded job {} in {}", response.job_guid, path.display());
    }
    for tu in &response.tus {
        if let Some(tgt) = &tu.tgt {
            println!("{}", tgt);
        }
    }
    Ok(())
}

async fn sync(matches: &ArgMatches, config: &Config) -> CliResult<()> {
    let targets: Vec<&str> = match matches.get_one::<String>("target") {
        Some(target) => vec![target.as_str()],
        None => config.target_langs.iter().map(String::as_str).collect(),
    };
    if targets.is_empty() {
        return Err("No target languages: pass --target or set targetLangs".into());
    }
    let mut manager = manager(config)?;
    for target in targets {
        let tm = manager.get_tm(&config.source_lang, target).await?;
        println!(
            "{}: {} TUs from {} jobs",
            tm.pair(),
            tm.len(),
            tm.job_statuses().len()
        );
    }
    Ok(())
}

async fn lookup(matches: &ArgMatches, config: &Config) -> CliResult<()> {
    let text = arg(matches, "text")?;
    let target = arg(matches, "target")?;
    let mut manager = manager(config)?;
    let tm = manager.get_tm(&config.source_lang, target).await?;
    let found = tm.lookup_by_source(&decode(text));
    if found.is_empty() {
        println!("No stored translation");
    }
    for tu in found {
        let tgt = tu.tgt.as_ref().map(ToString::to_string).unwrap_or_default();
        println!("{}\tq={}\t{}", tu.guid, tu.q.unwrap_or_default(), tgt);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();

    let matches = cli().get_matches();
    let root = Path::new(arg(&matches, "config")?);
    let config = Config::load(root)?;

    match matches.subcommand() {
        Some(("flatten", sub)) => flatten(sub),
        Some(("translate", sub)) => translate(sub, &config).await,
        Some(("sync", sub)) => sync(sub, &config).await,
        Some(("lookup", sub)) => lookup(sub, &config).await,
        _ => Err("unknown subcommand".into()),
    }
}
