fn main() -> anyhow::Result<()> {
    env_logger::init();
    propagation_gen::run()
}
