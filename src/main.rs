use fepdb::cli::{is_user_error, run, EXIT_INTERNAL_ERROR, EXIT_USER_ERROR};

fn main() {
    if let Err(e) = run() {
        if is_user_error(&e) {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_USER_ERROR);
        }

        // Database failures and other internal errors: show the cause chain
        eprintln!("Internal error: {}", e);
        let mut source = e.source();
        if source.is_some() {
            eprintln!("\nCaused by:");
            let mut indent = 1;
            while let Some(err) = source {
                eprintln!("{:indent$}  {}", "", err);
                source = err.source();
                indent += 1;
            }
        }
        std::process::exit(EXIT_INTERNAL_ERROR);
    }
}
