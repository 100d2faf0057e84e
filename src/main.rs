use xuezhan::config::ServerConfig;
use xuezhan::util::log::set_verbose;
use xuezhan::util::misc::error_exit;
use xuezhan::{info, server};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let conf = ServerConfig::from_args(&args).unwrap_or_else(error_exit);
    set_verbose(conf.verbose);
    info!("xuezhan server: {:?}", conf);

    if let Err(e) = server::run(&conf) {
        error_exit::<_, ()>(e);
    }
}
