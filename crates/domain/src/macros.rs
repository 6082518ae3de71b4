/// 検証済み文字列 Newtype の共通メソッドを生成する
///
/// `as_str()`、`into_string()`、`Display`、`AsRef<str>` を実装する。
/// 検証ロジックを持つ `new()` は各型で個別に定義する。
macro_rules! impl_string_value {
    ($Name:ident) => {
        impl $Name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl ::std::fmt::Display for $Name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}
