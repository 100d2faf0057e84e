use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::*;
use crate::error::ErrorCode;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uid, User>,
    desks: Vec<DeskRecord>,
    histories: Vec<History>,
    consumes: Vec<CardConsume>,
    clubs: HashMap<i64, Club>,
    members: HashSet<(i64, Uid)>,
    fail: bool, // trueの場合すべての操作がDBOperationで失敗する
}

// プロセス内のみで保持するストレージ (サーバ単体起動, テスト用)
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> GameResult<MutexGuard<'_, Tables>> {
        let t = self.tables.lock().map_err(|_| ErrorCode::DBOperation)?;
        if t.fail {
            return Err(ErrorCode::DBOperation);
        }
        Ok(t)
    }

    pub fn set_fail(&self, flag: bool) {
        if let Ok(mut t) = self.tables.lock() {
            t.fail = flag;
        }
    }

    pub fn insert_club(&self, club: Club) {
        if let Ok(mut t) = self.tables.lock() {
            t.members.insert((club.id, club.owner));
            t.clubs.insert(club.id, club);
        }
    }

    pub fn histories(&self) -> Vec<History> {
        self.tables
            .lock()
            .map(|t| t.histories.clone())
            .unwrap_or_default()
    }

    pub fn consumes(&self) -> Vec<CardConsume> {
        self.tables
            .lock()
            .map(|t| t.consumes.clone())
            .unwrap_or_default()
    }

    pub fn desks(&self) -> Vec<DeskRecord> {
        self.tables
            .lock()
            .map(|t| t.desks.clone())
            .unwrap_or_default()
    }
}

impl Storage for MemoryStorage {
    fn query_user(&self, uid: Uid) -> GameResult<User> {
        self.lock()?
            .users
            .get(&uid)
            .cloned()
            .ok_or(ErrorCode::UserNotFound)
    }

    fn update_user(&self, user: &User) -> GameResult {
        let mut t = self.lock()?;
        match t.users.get_mut(&user.uid) {
            Some(u) => {
                *u = user.clone();
                Ok(())
            }
            None => Err(ErrorCode::UserNotFound),
        }
    }

    fn insert_user(&self, user: &User) -> GameResult {
        let mut t = self.lock()?;
        if t.users.contains_key(&user.uid) {
            return Err(ErrorCode::DBOperation);
        }
        t.users.insert(user.uid, user.clone());
        Ok(())
    }

    fn user_add_coin(&self, uid: Uid, n: i64) -> GameResult<i64> {
        let mut t = self.lock()?;
        let u = t.users.get_mut(&uid).ok_or(ErrorCode::UserNotFound)?;
        u.coin += n;
        Ok(u.coin)
    }

    fn user_lose_coin(&self, uid: Uid, n: i64) -> GameResult<i64> {
        let mut t = self.lock()?;
        let u = t.users.get_mut(&uid).ok_or(ErrorCode::UserNotFound)?;
        if u.coin < n {
            return Err(ErrorCode::CoinNotEnough);
        }
        u.coin -= n;
        Ok(u.coin)
    }

    fn insert_desk(&self, desk: &DeskRecord) -> GameResult<i64> {
        let mut t = self.lock()?;
        let id = t.desks.len() as i64 + 1;
        let mut d = desk.clone();
        d.id = id;
        t.desks.push(d);
        Ok(id)
    }

    fn update_desk(&self, desk: &DeskRecord) -> GameResult {
        let mut t = self.lock()?;
        match t.desks.iter_mut().find(|d| d.id == desk.id) {
            Some(d) => {
                *d = desk.clone();
                Ok(())
            }
            None => Err(ErrorCode::DeskNotFound),
        }
    }

    fn insert_history(&self, history: &History) -> GameResult {
        self.lock()?.histories.push(history.clone());
        Ok(())
    }

    fn insert_consume(&self, consume: &CardConsume) -> GameResult {
        self.lock()?.consumes.push(consume.clone());
        Ok(())
    }

    fn club_list(&self, uid: Uid) -> GameResult<Vec<Club>> {
        let t = self.lock()?;
        let mut clubs: Vec<Club> = t
            .clubs
            .values()
            .filter(|c| t.members.contains(&(c.id, uid)))
            .cloned()
            .collect();
        clubs.sort_by_key(|c| c.id);
        Ok(clubs)
    }

    fn apply_club(&self, uid: Uid, club_id: i64) -> GameResult {
        let mut t = self.lock()?;
        if !t.clubs.contains_key(&club_id) {
            return Err(ErrorCode::NotFound);
        }
        t.members.insert((club_id, uid));
        Ok(())
    }

    fn is_club_member(&self, club_id: i64, uid: Uid) -> GameResult<bool> {
        Ok(self.lock()?.members.contains(&(club_id, uid)))
    }

    fn is_balance_enough(&self, club_id: i64) -> GameResult<bool> {
        let t = self.lock()?;
        let club = t.clubs.get(&club_id).ok_or(ErrorCode::NotFound)?;
        Ok(club.balance > 0)
    }
}

#[test]
fn test_memory_storage() {
    let st = MemoryStorage::new();
    let user = User {
        uid: 10,
        name: "guest10".to_string(),
        coin: 3,
        last_login: 0,
    };
    st.insert_user(&user).unwrap();
    assert_eq!(st.insert_user(&user), Err(ErrorCode::DBOperation));
    assert_eq!(st.user_lose_coin(10, 2), Ok(1));
    assert_eq!(st.user_lose_coin(10, 2), Err(ErrorCode::CoinNotEnough));
    assert_eq!(st.user_add_coin(10, 4), Ok(5));
    assert_eq!(st.query_user(11), Err(ErrorCode::UserNotFound));

    st.insert_club(Club {
        id: 7,
        name: "club".to_string(),
        owner: 1,
        balance: 100,
    });
    assert_eq!(st.is_club_member(7, 10), Ok(false));
    st.apply_club(10, 7).unwrap();
    assert_eq!(st.club_list(10).unwrap().len(), 1);
    assert_eq!(st.is_balance_enough(7), Ok(true));

    st.set_fail(true);
    assert_eq!(st.query_user(10), Err(ErrorCode::DBOperation));
}
