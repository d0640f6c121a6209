//! HLSL to Metal cross-compiler CLI.

use hlslcc::commands::{compile_file, init_tracing, lex_file, parse_file, show_bindings, strip_outputs};

fn main() {
    init_tracing();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = &args[1];
    match command.as_str() {
        "compile" => {
            if args.len() < 3 {
                eprintln!("Usage: hlslcc compile <file> [options]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --entry=<name>        Entry point (default: Main)");
                eprintln!("  --stage=<stage>       vertex, pixel or compute (default: vertex)");
                eprintln!("  --target=<platform>   macos or ios (default: macos)");
                eprintln!("  --flatten-ub          Pack cbuffers into the uniform arrays");
                eprintln!("  --no-opt              Skip the IR optimizer");
                eprintln!("  -o <path>             Output file (default: stdout)");
                std::process::exit(1);
            }
            compile_file(&args[2..]);
        }
        "lex" => {
            if args.len() < 3 {
                eprintln!("Usage: hlslcc lex <file>");
                std::process::exit(1);
            }
            lex_file(&args[2]);
        }
        "parse" => {
            if args.len() < 3 {
                eprintln!("Usage: hlslcc parse <file>");
                std::process::exit(1);
            }
            parse_file(&args[2]);
        }
        "strip-outputs" => strip_outputs(&args[2..]),
        "bindings" => {
            if args.len() < 3 {
                eprintln!("Usage: hlslcc bindings <file.metal>");
                std::process::exit(1);
            }
            show_bindings(&args[2]);
        }
        "help" | "--help" | "-h" => print_usage(),
        "version" | "--version" | "-V" => {
            let (major, minor) = hlslcc_metal::VERSION;
            println!("hlslcc {} (HLSLCC {major}.{minor})", env!("CARGO_PKG_VERSION"));
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("HLSL to Metal cross-compiler");
    println!();
    println!("Usage: hlslcc <command> [options]");
    println!();
    println!("Commands:");
    println!("  compile <file>         Compile HLSL to Metal Shading Language");
    println!("  lex <file>             Tokenize and display tokens");
    println!("  parse <file>           Parse and list top-level declarations");
    println!("  strip-outputs <file>   Append an entry point without unused outputs");
    println!("  bindings <file.metal>  Read the binding header of generated code");
    println!("  help                   Show this help message");
    println!("  version                Show version information");
    println!();
    println!("Strip-outputs options:");
    println!("  --entry=<name>         Entry point to wrap");
    println!("  --used=<A,B>           Semantics read by the next stage");
    println!("  --system=<X,Y>         Semantics always kept (default: SV_POSITION)");
    println!();
    println!("Examples:");
    println!("  hlslcc compile Shader.usf --stage=pixel --entry=MainPS -o Shader.metal");
    println!("  hlslcc compile Shader.usf --stage=vertex --entry=MainVS --flatten-ub");
    println!("  hlslcc strip-outputs Shader.usf --entry=MainVS --used=TEXCOORD0");
    println!("  hlslcc bindings Shader.metal");
}
