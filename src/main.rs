use std::process;

#[tokio::main]
async fn main() {
    if let Err(err) = adsview_lib::run().await {
        adsview_lib::output::print_error(&err);
        process::exit(1);
    }
}
