use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, PanicHookInfo};
use std::sync::OnceLock;

static HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

/// panic ペイロードを文字列にする。`&str` と `String` 以外は固定文言。
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string payload>".to_string())
}

/// ワーカースレッドの panic を log に流すフックを設定する。
/// 二回目以降の呼び出しは何もしない。
pub fn install_panic_hook() {
    if HOOK_INSTALLED.set(()).is_err() {
        return;
    }

    panic::set_hook(Box::new(|info: &PanicHookInfo<'_>| {
        let payload = payload_message(info.payload());

        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "<unknown>".to_string());

        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("<unnamed>");

        let frames: Vec<String> = Backtrace::capture()
            .to_string()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(6)
            .map(str::to_string)
            .collect();

        log::error!(
            target: "panic",
            "thread '{thread_name}' panicked at {location}: {payload} [{}]",
            if frames.is_empty() { "<no backtrace>".to_string() } else { frames.join(" | ") }
        );
    }));
}
