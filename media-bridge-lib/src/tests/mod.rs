macro_rules! options {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut options = $crate::types::OptionSet::new();
        $(options.insert($key.to_string(), $value.to_string());)*
        options
    }};
}

mod stream;

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
