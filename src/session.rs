/// 流水线持有的连接状态：`Uninitialized → Open → Finished`
#[derive(Debug, Default)]
pub(crate) enum Session<C> {
    #[default]
    Uninitialized,
    Open(C),
    Finished,
}

impl<C> Session<C> {
    pub fn get_mut(&mut self) -> Option<&mut C> {
        match self {
            Self::Open(conn) => Some(conn),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// 打开新连接，返回之前尚未释放的连接
    pub fn open(&mut self, conn: C) -> Option<C> {
        match std::mem::replace(self, Self::Open(conn)) {
            Self::Open(old) => Some(old),
            _ => None,
        }
    }

    /// 进入结束状态，返回需要释放的连接，重复调用时返回 None
    pub fn finish(&mut self) -> Option<C> {
        match std::mem::replace(self, Self::Finished) {
            Self::Open(conn) => Some(conn),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut session = Session::default();
        assert!(!session.is_open());
        assert_eq!(session.open(1), None);
        assert_eq!(session.get_mut(), Some(&mut 1));
        assert_eq!(session.open(2), Some(1));
        assert_eq!(session.finish(), Some(2));
        assert_eq!(session.finish(), None);
        assert!(matches!(session, Session::Finished));
        assert_eq!(session.get_mut(), None);
    }
}
