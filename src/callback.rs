/// Generates callback-style wrappers around async methods.
///
/// Each generated method clones `self`, runs the async method on the Tokio
/// runtime and hands the outcome to the callback. Failures are wrapped in
/// [`crate::RtviError::AsyncExecutionFailed`] naming the async method.
macro_rules! callback_variants {
    ($(
        $(#[$meta:meta])*
        fn $name:ident => $method:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty;
    )*) => {
        $(
            $(#[$meta])*
            pub fn $name<C>(&self, $($arg: $ty,)* callback: C)
            where
                C: FnOnce($crate::error::Result<$ret>) + Send + 'static,
            {
                let this = self.clone();
                tokio::spawn(async move {
                    let result = this
                        .$method($($arg),*)
                        .await
                        .map_err(|e| $crate::error::RtviError::async_execution(stringify!($method), e));
                    callback(result);
                });
            }
        )*
    };
}
