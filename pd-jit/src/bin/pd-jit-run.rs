use std::io;

use jit::logging::{self, category_fallback, category_jit};
use jit::{
    CompiledCode, DEFAULT_BUFFER_CAPACITY, Jit, JitConfig, JitResult, Node, RuntimeContext,
    ValueCell, ValueKind,
};
use tracing::{info, warn};

const VARIABLE: &str = "x";

#[derive(Debug, Clone, PartialEq)]
struct CliConfig {
    capacity: usize,
    max_capacity: usize,
    value: f64,
    dump: bool,
    help: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
            max_capacity: 16 * DEFAULT_BUFFER_CAPACITY,
            value: 10.0,
            dump: false,
            help: false,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli_args(&args).map_err(io::Error::other)?;
    if cli.help {
        print_usage();
        return Ok(());
    }
    logging::init()?;

    let mut jit = Jit::new(JitConfig {
        buffer_capacity: cli.capacity,
        ..JitConfig::default()
    });
    for (name, node) in sample_programs(cli.value)? {
        let cell = ValueCell::with_number(cli.value);
        let ctx = RuntimeContext::new(VARIABLE, &cell);
        let code = match compile_with_retry(&mut jit, &node, &ctx, cli.max_capacity) {
            Ok(code) => code,
            Err(err) => {
                info!("{} {name}: {err}", category_fallback());
                continue;
            }
        };
        if cli.dump {
            print!("{}", hex_dump(name, code.code()));
        }
        let rendered = match code.result_kind() {
            ValueKind::Number => code.run_number()?.to_string(),
            ValueKind::String => format!("{:?}", code.run_string()?),
            ValueKind::Unit => {
                code.run();
                format!("{VARIABLE} = {}", cell.string())
            }
        };
        info!(
            "{} {name}: {rendered} ({} bytes)",
            category_jit(),
            code.len()
        );
    }
    Ok(())
}

/// Doubles the buffer after each overflow until `max_capacity` is reached.
fn compile_with_retry<'a>(
    jit: &mut Jit,
    node: &'a Node,
    ctx: &RuntimeContext<'a>,
    max_capacity: usize,
) -> JitResult<CompiledCode<'a>> {
    loop {
        match jit.compile(node, ctx) {
            Err(err) if err.is_overflow() && jit.config().buffer_capacity < max_capacity => {
                let mut config = jit.config().clone();
                config.buffer_capacity = config
                    .buffer_capacity
                    .saturating_mul(2)
                    .min(max_capacity);
                warn!(
                    "{} {err}; retrying with {} bytes",
                    category_jit(),
                    config.buffer_capacity
                );
                jit.set_config(config);
            }
            other => return other,
        }
    }
}

/// Trees over the single bound variable; the countdown only terminates for
/// non-negative integral starting values, so it is skipped otherwise.
fn sample_programs(value: f64) -> Result<Vec<(&'static str, Node)>, Box<dyn std::error::Error>> {
    let x = || Node::var(VARIABLE);
    let mut programs = vec![
        (
            "arith",
            Node::rem(
                Node::add(Node::mul(x(), Node::number(3.0)), Node::number(1.0)),
                Node::number(7.0),
            ),
        ),
        ("negate", Node::neg(Node::div(x(), Node::number(4.0)))),
        ("concat", Node::concat(Node::string("x=")?, x())),
    ];
    if value >= 0.0 && value.fract() == 0.0 {
        programs.push((
            "countdown",
            Node::while_loop(
                x(),
                Node::assign(VARIABLE, Node::sub(x(), Node::number(1.0))),
            ),
        ));
    }
    programs.push((
        "label",
        Node::assign(
            VARIABLE,
            Node::concat(Node::string("#")?, Node::concat(x(), Node::string("!")?)),
        ),
    ));
    programs.push(("print", Node::Print(vec![x()])));
    Ok(programs)
}

fn hex_dump(name: &str, code: &[u8]) -> String {
    let mut out = format!("{name}:\n");
    for (row, chunk) in code.chunks(16).enumerate() {
        let bytes = chunk
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!("  {:04X}  {bytes}\n", row * 16));
    }
    out
}

fn parse_cli_args(args: &[String]) -> Result<CliConfig, String> {
    let mut cfg = CliConfig::default();
    let mut index = 0usize;

    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => {
                cfg.help = true;
                index += 1;
            }
            "--dump" => {
                cfg.dump = true;
                index += 1;
            }
            "--capacity" => {
                cfg.capacity = parse_flag_value(args, index, "--capacity")?;
                index += 2;
            }
            "--max-capacity" => {
                cfg.max_capacity = parse_flag_value(args, index, "--max-capacity")?;
                index += 2;
            }
            "--value" => {
                cfg.value = parse_flag_value(args, index, "--value")?;
                index += 2;
            }
            value => {
                return Err(format!("unknown argument '{value}'"));
            }
        }
    }

    if cfg.capacity == 0 {
        return Err("--capacity must be > 0".to_string());
    }
    if cfg.max_capacity < cfg.capacity {
        cfg.max_capacity = cfg.capacity;
    }
    Ok(cfg)
}

fn parse_flag_value<T: std::str::FromStr>(
    args: &[String],
    index: usize,
    flag: &str,
) -> Result<T, String> {
    let raw = args
        .get(index + 1)
        .ok_or_else(|| format!("missing value for {flag}"))?;
    raw.parse::<T>()
        .map_err(|_| format!("invalid {flag} value '{raw}'"))
}

fn print_usage() {
    println!("Usage:");
    println!("  pd-jit-run [--value <x>] [--dump]");
    println!("  pd-jit-run [--capacity <bytes>] [--max-capacity <bytes>]");
}
